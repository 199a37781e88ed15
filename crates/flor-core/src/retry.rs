//! Retry helper for flaky network calls.
//!
//! The first failure is only reported. Later failures are reported, then
//! the helper sleeps; the sleep doubles up to the sixth retry and then
//! drops back to the initial interval.

use crate::Reporter;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const DOUBLING_LIMIT: u32 = 6;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Sleep before the second retry
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(125),
        }
    }
}

/// Run `op` until it succeeds or `config.max_retries` retries are spent.
///
/// `retry_msg` is appended to each retry warning and `error_msg` to the
/// final error line; either may be empty to stay quiet.
///
/// # Errors
///
/// Returns the error of the last attempt once retries are exhausted.
pub async fn retry_on_error<T, E, F, Fut>(
    config: &RetryConfig,
    reporter: &dyn Reporter,
    retry_msg: &str,
    error_msg: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = config.max_retries;
    let mut delay = config.initial_delay;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= max {
                    if !error_msg.is_empty() {
                        reporter.err(&format!("{e} {error_msg} {attempt}/{max}"));
                    }
                    return Err(e);
                }
                if attempt == 0 {
                    reporter.warn(&e.to_string());
                } else {
                    if !retry_msg.is_empty() {
                        reporter.warn(&format!("{e} {retry_msg} {attempt}/{max}..."));
                    }
                    tokio::time::sleep(delay).await;
                    if attempt <= DOUBLING_LIMIT {
                        delay *= 2;
                    } else {
                        delay = config.initial_delay;
                    }
                }
                attempt += 1;
            }
        }
    }
}
