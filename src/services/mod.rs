pub mod competitor;
pub mod content_loop;
pub mod droid;
pub mod extractors;
pub mod navigator;
pub mod openai_client;
pub mod orchestrator;
pub mod page_source;

pub use competitor::*;
pub use content_loop::*;
pub use droid::*;
pub use openai_client::*;
pub use orchestrator::*;
