pub mod counts;
pub mod keyword;
pub mod menu;
pub mod recency;
pub mod text_field;
