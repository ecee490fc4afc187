pub mod campaign_store;
pub mod excel;
pub mod file_processor;
