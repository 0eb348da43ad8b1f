//! # hs-optimizer
//!
//! Random hyperparameter search orchestration for model training.
//!
//! Provides validated search spaces, a memoryless random sampler, append-only
//! audit files, isolated trial execution with a guaranteed state reset, and a
//! sequential search loop that survives numerically diverging trials.

pub mod audit;
mod error;
mod params;
mod sampler;
mod search;
mod session;
mod trial;

pub use audit::AuditLog;
pub use error::{SearchError, SearchResult, TrainingError};
pub use params::{TrainingParameter, TrainingParameters};
pub use sampler::{SampledConfiguration, Sampler};
pub use search::{HyperparameterSpec, ParameterDef, ParameterValue, SearchSpace, SearchSpaceBuilder};
pub use session::{SearchLoop, SearchSession, SessionRecord, SessionState, SessionStatus};
pub use trial::{
    ResetGuard, SessionId, Trainer, Trial, TrialOutcome, TrialPhase, TrialRecord, TrialRunner,
};
