//! Client Module
//!
//! HTTP transport for the messages endpoint.

pub mod http;

pub use http::{ByteStream, HttpClient};
