//! raspberry - Worst-picture award catalog with redundant persistence
//!
//! Every record lives in three places that are kept in step by the
//! orchestrators in [`service`]: a relational store (SQLite), a durable
//! identifier counter file, and a delimited text mirror of the record set.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Records, inputs, filters and interval reports
//! - [`storage`] - Relational store, schema bootstrap, counter and mirror
//! - [`analytics`] - Producer win interval computation
//! - [`service`] - Create / update / delete orchestration
//! - [`server`] - HTTP routes over the service
//! - [`utils`] - Retry policy
//!
//! # Example
//!
//! ```no_run
//! use raspberry::config::Config;
//! use raspberry::service::MovieService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let service = MovieService::from_config(&config)?;
//!     service.initialize(config.bootstrap.retry_config()).await?;
//!     println!("{:?}", service.get_intervals()?);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod service;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{IntervalReport, MovieInput, MovieRecord, ProducerInterval};
    pub use crate::service::MovieService;
    pub use crate::storage::{IdAllocator, MirrorSynchronizer, SqliteMovieRepository};
}

pub use error::{Error, Result};
pub use models::{IntervalReport, MovieInput, MovieRecord, ProducerInterval};
