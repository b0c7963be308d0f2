//! Request-independent services used by the router.

pub mod client;
pub mod request;
pub mod user_agent;
