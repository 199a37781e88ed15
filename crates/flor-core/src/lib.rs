pub mod archive;
pub mod batch;
pub mod config;
pub mod context;
pub mod docker;
pub mod error;
pub mod generator;
pub mod git;
pub mod layer_index;
pub mod license;
pub mod naming;
pub mod overlay;
pub mod paths;
pub mod pull_request;
pub mod recipe;
pub mod repo;
pub mod resolver;
pub mod retry;
pub mod rosdistro;
pub mod sidecar;
pub mod util;

pub mod reporter;

pub use context::GenerationContext;
pub use error::FlorError;
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for outgoing HTTP requests
pub const USER_AGENT: &str = concat!("flor/", env!("CARGO_PKG_VERSION"));

/// Program version written into generated configuration
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(300))
        .build()?)
}
