//! Bounded retries of transient endpoint failures.

use qtree_core::{Node, Triple};
use qtree_sparql::{Binding, Endpoint, EndpointError};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; later retries wait proportionally longer.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 200,
        }
    }
}

/// Retries `Transport` and `Timeout` errors of the inner endpoint. Other
/// errors and the last transient one are returned as they are.
#[derive(Debug)]
pub struct RetryingEndpoint<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: Endpoint> RetryingEndpoint<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn retry<T>(
        &self,
        request: &str,
        mut op: impl FnMut(&E) -> Result<T, EndpointError>,
    ) -> Result<T, EndpointError> {
        let mut attempt = 0;
        loop {
            match op(&self.inner) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        request,
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %err,
                        "endpoint call failed, retrying"
                    );
                    let backoff = self.policy.backoff_ms.saturating_mul(u64::from(attempt));
                    if backoff > 0 {
                        thread::sleep(Duration::from_millis(backoff));
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<E: Endpoint> Endpoint for RetryingEndpoint<E> {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
        self.retry("select", |inner| inner.select(query))
    }

    fn construct_description(
        &self,
        resource: &Node,
        depth: usize,
    ) -> Result<Vec<Triple>, EndpointError> {
        self.retry("describe", |inner| inner.construct_description(resource, depth))
    }
}
