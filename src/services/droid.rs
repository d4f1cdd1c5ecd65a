use fake_user_agent::get_rua;
use thirtyfour::error::WebDriverResult;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

/// Factory for isolated WebDriver sessions. One session per diagnosis
/// request; competitor enrichment never shares a session with the main
/// extraction flow.
#[derive(Clone)]
pub struct Droid {
    webdriver_url: String,
}

impl Droid {
    pub fn new(webdriver_url: String) -> Self {
        Droid { webdriver_url }
    }

    /// Fresh session with a randomized plausible user agent and a mobile
    /// viewport, since the whole page family we target is the mobile site.
    pub async fn new_session(&self) -> WebDriverResult<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--headless=new")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--window-size=412,915")?;
        caps.add_arg(&format!("--user-agent={}", get_rua()))?;

        WebDriver::new(&self.webdriver_url, caps).await
    }

    /// Best-effort session teardown. Every exit path of the orchestrator
    /// funnels through here so no browser context is ever leaked.
    pub async fn dispose(driver: WebDriver) {
        if let Err(e) = driver.quit().await {
            log::error!("Failed to quit webdriver session: {:?}", e);
        }
    }
}
