//! HTTP lifecycle engine: URL assembly, authentication, requests, polling and
//! state conversion.

pub mod auth;
pub mod client;
pub mod payload;
pub mod polling;
pub mod url;

pub use client::{ApiClient, ApiRequest, ApiResponse};
