use std::net::TcpListener;

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};

use crate::configuration::Settings;
use crate::routes::{default_route, diagnose_route, premium_route};
use crate::services::{Droid, OpenaiClient};

pub fn run(
    listener: TcpListener,
    settings: Settings,
    droid: Droid,
    openai_client: OpenaiClient,
) -> Result<Server, std::io::Error> {
    let settings = Data::new(settings);
    let droid = Data::new(droid);
    let openai_client = Data::new(openai_client);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(
                web::scope("/diagnose")
                    .service(premium_route::premium_diagnose)
                    .service(diagnose_route::diagnose),
            )
            .app_data(settings.clone())
            .app_data(droid.clone())
            .app_data(openai_client.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
