//! Proxywatch daemon: singleton claim, command socket, proxy poll loop.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
pub mod proxy_log;
mod runtime;
pub mod singleton;

pub use error::DaemonError;
pub use protocol::{send_command, Reply};
pub use proxy_log::ProxyLog;
pub use runtime::{run, start_blocking};
pub use singleton::{claim_singleton, ClientConfig, Role, ServerConfig};
