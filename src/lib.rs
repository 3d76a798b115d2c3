pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod taxonomy;
pub mod validators;
pub mod fetch;
pub mod storage;
pub mod sync;
pub mod workflows;

pub use config::{CatalogPaths, Config, WorkflowContext};
pub use error::{Error, Result};
pub use fetch::{AppFetcher, FnpackFetcher};
pub use github::{GitHubClient, RetryPolicy};
pub use sync::{BatchReport, CatalogUpdater, FnpackTarget};
