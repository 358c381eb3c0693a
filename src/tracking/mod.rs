pub mod differ;
pub mod extractor;
pub mod poller;
