pub mod config;
pub mod data;
pub mod error;
pub mod monitoring;
pub mod notify;
pub mod storage;
pub mod tracking;
