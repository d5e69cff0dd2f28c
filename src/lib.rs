// Library interface for ReadyRS modules
// This allows integration tests and benches to access the core functionality

pub mod baseline;
pub mod classifier;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod models;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use models::*;
pub use baseline::BaselineStats;
pub use classifier::{Classifier, Evaluation, EvaluationDetail, Thresholds};
pub use clock::{Clock, DayBoundary, FixedClock, SystemClock};
pub use compliance::ComplianceLog;
pub use config::AppConfig;
pub use error::{ReadyError, Result};
pub use history::{ReadingHistory, HISTORY_CAPACITY};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use session::{BaselinePhase, BaselineProgress, SessionState};
pub use storage::{KeyValueStore, MemoryStore, SessionStore, WriteBehind};
