use std::net::TcpListener;

use env_logger::Env;
use jindan::{
    configuration::get_configuration,
    services::{Droid, OpenaiClient},
    startup::run,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;

    let droid = Droid::new(configuration.webdriver.url.clone());
    let openai_client = OpenaiClient::new(configuration.api_keys.openai.clone());

    log::info!(
        "Starting on port {} (webdriver at {})",
        configuration.application.port,
        configuration.webdriver.url
    );

    run(listener, configuration, droid, openai_client)?.await
}
