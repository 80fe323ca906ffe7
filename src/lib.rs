pub mod app;
pub mod catalog;
pub mod config;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod models;
pub mod search;
pub mod trending;
pub mod utils;
