//! # autobackup - Background File Backup Agent
//!
//! Periodically discovers new files under a set of monitored directories,
//! skips content that was already uploaded, and transfers the rest to a
//! remote store with bounded retries.
//!
//! ## One cycle by hand
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use autobackup::{Config, HttpTransfer, Scanner, Scheduler, StateStore, UploadPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let store = Arc::new(StateStore::open_in(&config.state_dir)?);
//!     let scheduler = Scheduler::new(
//!         store,
//!         Scanner::from_config(&config)?,
//!         UploadPipeline::from_config(&config.upload),
//!         Arc::new(HttpTransfer::new(&config.remote)?),
//!     );
//!     println!("{:?}", scheduler.trigger().await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scanner;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transfer;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use config::Config;
pub use environment::{Environment, FixedEnvironment, NetworkKind, PowerState, SystemEnvironment};
pub use error::{BackupError, ConfigError, StoreError};
pub use pipeline::{FailureKind, PipelineOutcome, RetryPolicy, UploadPipeline};
pub use scanner::{scan, ExtensionFilter, FileCategory, Scanner};
pub use scheduler::{
	CycleReport, Registration, Scheduler, SchedulerState, SkipReason, TriggerResult,
};
pub use status::{LogStatus, NoStatus, StatusEvent, StatusReporter};
pub use store::StateStore;
pub use transfer::{HttpTransfer, Transfer, TransferOutcome};
pub use types::{CandidateFile, DeviceIdentity, Fingerprint, Settings};

// vim: ts=4
