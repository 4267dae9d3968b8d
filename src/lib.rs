//! Delay reporting for city-line routes: per-stage GPT reports and the
//! provincial summary reconciled against them.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod gpt;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod process;
pub mod reconcile;
pub mod stages;
pub mod table;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{ReportError, Result};
pub use reconcile::{reconcile, ReconStats, ReconcileInput, Reconciliation};
pub use stages::{Stage, StageCatalog, StageMatch, TieBreak};
pub use table::Table;
pub use types::RunMode;
