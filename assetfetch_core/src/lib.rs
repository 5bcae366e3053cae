pub mod catalog;
pub mod downloader;
pub mod progress;
pub mod report;
pub mod types;
