pub mod cli;
pub mod config;
pub mod constants;
pub mod duration;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
pub mod spec;
pub mod utils;
