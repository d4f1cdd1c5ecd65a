pub mod business;
pub mod extraction;
pub mod industry;
pub mod scoring;
