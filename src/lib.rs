pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod planner;
pub mod progress;
pub mod report;
pub mod runner;
pub mod timestamp;
pub mod transport;

pub use config::AppConfig;
pub use engine::{SyncEngine, SyncSettings};
pub use error::Error;
pub use planner::ReconciliationPlan;
pub use progress::{SilentReporter, SyncReporter};
pub use report::{NormalizeReport, Phase, PhaseReport, SyncReport, TaskOutcome};
pub use runner::TaskRunner;
pub use timestamp::CanonicalTimestamp;
pub use transport::{AdbBridge, Transport, TransportError};
