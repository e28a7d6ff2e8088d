//! pathproxy - forwards HTTP requests to a single upstream, optionally
//! restricted to one exact request path.

pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod server;

pub use config::{Args, ProxyConfig};
pub use error::{ConfigError, ProxyError};
pub use filter::PathFilter;
pub use proxy::{Forwarder, ProxyState};
