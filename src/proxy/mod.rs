//! Proxy core modules.

pub mod engine;
pub mod handler;
pub mod headers;
pub mod redirect;
pub mod resolver;
pub mod stream;

pub use handler::proxy_handler;
