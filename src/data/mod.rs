pub mod cache;
pub mod catalog;
pub mod icons;
pub mod lookup;
pub mod steam_api;
pub mod types;
