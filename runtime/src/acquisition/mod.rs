//! Markup acquisition without a browser: HTTP fetches, strategy probing and
//! receipt API discovery.

pub mod api_discovery;
pub mod http_client;
pub mod strategy;
