//! Schema bootstrapping with bounded backoff
//!
//! The relational store may still be provisioning when the process starts.
//! [`SchemaBootstrapper`] probes the store, creates the schema when the probe
//! reports a missing relation, and re-probes with exponential backoff:
//!
//! ```text
//! Unchecked ──► Probing ──► Ready
//!                 │  ▲
//!        missing  │  │ delay (doubling, capped)
//!                 ▼  │
//!               Creating
//!                 │
//!                 └──► Failed   (other probe error, or attempts exhausted)
//! ```
//!
//! Only "missing table" is retried. Any other probe failure is fatal at once
//! so a genuine outage is never masked by the loop.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::utils::retry::RetryConfig;

/// Outcome of a failed schema probe
#[derive(Debug)]
pub enum ProbeError {
    /// The store answered, but the relation does not exist yet
    MissingTable(String),

    /// Anything else: connectivity, permissions, corruption
    Other(Error),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable(msg) => write!(f, "relation missing: {msg}"),
            Self::Other(err) => write!(f, "{err}"),
        }
    }
}

/// Store-side hooks needed by the bootstrapper
pub trait SchemaProbe: Send + Sync {
    /// Cheap read-only query against the movies relation
    fn probe(&self) -> std::result::Result<(), ProbeError>;

    /// Idempotent create-if-absent schema statement
    fn create_schema(&self) -> Result<()>;
}

/// Bootstrapper lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unchecked,
    Probing,
    Creating,
    Ready,
    Failed,
}

/// Guarantees the schema exists before any other component touches the store
#[derive(Debug)]
pub struct SchemaBootstrapper {
    retry: RetryConfig,
    state: BootstrapState,
    attempts: u32,
}

impl SchemaBootstrapper {
    /// Create a bootstrapper with the given backoff policy
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            retry,
            state: BootstrapState::Unchecked,
            attempts: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Number of probes issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Probe, create and re-probe until the schema is ready or the budget runs out
    ///
    /// The budget counts create attempts. Every create is followed by another
    /// probe, so a single attempt is enough to bring up a fresh database.
    pub async fn ensure_schema<S>(&mut self, store: &S) -> Result<()>
    where
        S: SchemaProbe + ?Sized,
    {
        if self.state == BootstrapState::Ready {
            return Ok(());
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut creates = 0u32;

        loop {
            self.state = BootstrapState::Probing;
            self.attempts += 1;

            match store.probe() {
                Ok(()) => {
                    self.state = BootstrapState::Ready;
                    info!(attempts = self.attempts, "Schema ready");
                    return Ok(());
                }
                Err(ProbeError::MissingTable(msg)) => {
                    if creates >= max_attempts {
                        self.state = BootstrapState::Failed;
                        return Err(Error::storage(format!(
                            "Schema still missing after {max_attempts} attempts"
                        )));
                    }

                    creates += 1;
                    warn!(
                        attempt = creates,
                        max_attempts = max_attempts,
                        reason = %msg,
                        "Schema missing, creating"
                    );
                    self.state = BootstrapState::Creating;
                    if let Err(e) = store.create_schema() {
                        self.state = BootstrapState::Failed;
                        return Err(Error::storage_with_source("Failed to create schema", e));
                    }

                    let delay = self.retry.delay_for(creates);
                    debug!(
                        attempt = creates,
                        delay_ms = delay.as_millis(),
                        "Re-probing schema after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(ProbeError::Other(e)) => {
                    self.state = BootstrapState::Failed;
                    return Err(Error::storage_with_source("Schema probe failed", e));
                }
            }
        }
    }
}
