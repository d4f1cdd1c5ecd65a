pub mod configuration;
pub mod domain;
pub mod error;
pub mod routes;
pub mod services;
pub mod startup;
