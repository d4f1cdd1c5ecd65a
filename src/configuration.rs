use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub webdriver: WebdriverSettings,
    pub api_keys: ApiKeySettings,
    pub scrape: ScrapeSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebdriverSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySettings {
    pub openai: String,
}

/// Tuning knobs for the extraction and discovery pipeline. All of these
/// have workable defaults; env overrides use the JINDAN__ prefix, e.g.
/// JINDAN__SCRAPE__ENRICH_CONCURRENCY=4.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub navigation_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub frame_wait_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub discovery_deadline_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub enrich_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub competitor_limit: usize,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("webdriver.url", "http://localhost:4444")?
        .set_default("api_keys.openai", "")?
        .set_default("scrape.navigation_timeout_secs", 25)?
        .set_default("scrape.frame_wait_secs", 4)?
        .set_default("scrape.discovery_deadline_secs", 90)?
        .set_default("scrape.enrich_concurrency", 3)?
        .set_default("scrape.competitor_limit", 5)?
        .add_source(
            config::Environment::with_prefix("JINDAN")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = get_configuration().expect("default configuration should parse");
        assert_eq!(settings.application.port, 8000);
        assert!(settings.scrape.enrich_concurrency >= 1);
        assert!(settings.scrape.discovery_deadline_secs > 0);
    }
}
