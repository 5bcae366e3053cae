pub mod batch;
pub mod fetcher;
pub mod retry;
