//! Upstream providers whose URL shapes the router understands.

pub mod github;
