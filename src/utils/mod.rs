//! Small helpers shared across handlers.

pub mod errors;
pub mod url;
