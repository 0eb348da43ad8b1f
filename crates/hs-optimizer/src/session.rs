//! Search sessions and the sequential search loop.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{self, AuditLog};
use crate::error::{SearchError, SearchResult};
use crate::sampler::Sampler;
use crate::search::SearchSpace;
use crate::trial::{SessionId, Trainer, Trial, TrialOutcome, TrialRunner};

/// Top-level context for one search run.
#[derive(Debug, Clone)]
pub struct SearchSession {
    pub id: SessionId,
    pub total_trials: usize,
    pub space: SearchSpace,
    /// Session-level settings recorded alongside the space. Kept as opaque
    /// JSON so this crate doesn't depend on how the settings were collected.
    pub settings: serde_json::Map<String, serde_json::Value>,
    /// Command line that reproduces this session.
    pub invocation: String,
    pub created_at: DateTime<Utc>,
    audit: AuditLog,
}

impl SearchSession {
    /// Open a session writing its audit files into `output_dir`.
    ///
    /// The invocation defaults to this process's own arguments.
    pub fn create<P: AsRef<Path>>(
        output_dir: P,
        space: SearchSpace,
        total_trials: usize,
    ) -> SearchResult<Self> {
        let audit = AuditLog::open(output_dir)?;
        Ok(Self {
            id: Uuid::new_v4(),
            total_trials,
            space,
            settings: serde_json::Map::new(),
            invocation: audit::command_line(
                std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()),
            ),
            created_at: Utc::now(),
            audit,
        })
    }

    /// Attach session-level settings. Structs and maps are merged as
    /// top-level fields; any other value is stored under `"settings"`.
    pub fn with_settings<S: Serialize>(mut self, settings: &S) -> SearchResult<Self> {
        match serde_json::to_value(settings)? {
            serde_json::Value::Object(map) => self.settings = map,
            other => {
                self.settings.insert("settings".to_string(), other);
            }
        }
        Ok(self)
    }

    pub fn with_invocation<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.invocation = audit::command_line(args);
        self
    }

    pub fn output_dir(&self) -> &Path {
        self.audit.dir()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The configuration audit entry for this session.
    pub fn record(&self) -> SessionRecord<'_> {
        SessionRecord {
            session_id: self.id,
            created_at: self.created_at,
            output_dir: self.output_dir().to_path_buf(),
            total_trials: self.total_trials,
            search_space: &self.space,
            settings: &self.settings,
        }
    }
}

/// Self-describing record of everything a session was started with.
#[derive(Debug, Serialize)]
pub struct SessionRecord<'a> {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub total_trials: usize,
    pub search_space: &'a SearchSpace,
    #[serde(flatten)]
    pub settings: &'a serde_json::Map<String, serde_json::Value>,
}

/// Lifecycle state for a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of a search session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: SessionState,
    pub total_trials: usize,
    pub trials_attempted: usize,
    pub trials_completed: usize,
    /// Trials that diverged numerically and were skipped over.
    pub trials_recovered: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SessionStatus {
    pub fn new(session: &SearchSession) -> Self {
        Self {
            session_id: session.id,
            state: SessionState::Pending,
            total_trials: session.total_trials,
            trials_attempted: 0,
            trials_completed: 0,
            trials_recovered: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SessionState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SessionState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SessionState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}

/// Drives a session's trials one after another.
///
/// Each iteration samples a configuration, appends it to the trial audit
/// file, and runs it. Numeric divergence is logged and skipped; any other
/// trainer failure ends the search.
#[derive(Debug)]
pub struct SearchLoop<T, R = StdRng> {
    sampler: Sampler<R>,
    runner: TrialRunner<T>,
    status: Option<SessionStatus>,
}

impl<T: Trainer, R: Rng> SearchLoop<T, R> {
    pub fn new(sampler: Sampler<R>, trainer: T) -> Self {
        Self {
            sampler,
            runner: TrialRunner::new(trainer),
            status: None,
        }
    }

    pub fn trainer(&self) -> &T {
        self.runner.trainer()
    }

    /// Status of the most recent [`Self::execute`] call, including one that
    /// returned an error.
    pub fn status(&self) -> Option<&SessionStatus> {
        self.status.as_ref()
    }

    pub fn execute(&mut self, session: &SearchSession) -> SearchResult<SessionStatus> {
        let mut status = SessionStatus::new(session);
        let result = self.run_trials(session, &mut status);

        match &result {
            Ok(()) => {
                status.mark_completed();
                info!(
                    session = %session.id,
                    attempted = status.trials_attempted,
                    completed = status.trials_completed,
                    recovered = status.trials_recovered,
                    "Search session finished"
                );
            }
            Err(e) => {
                error!(session = %session.id, "Search session aborted: {}", e);
                status.mark_failed(e.to_string());
            }
        }

        self.status = Some(status.clone());
        result.map(|()| status)
    }

    fn run_trials(
        &mut self,
        session: &SearchSession,
        status: &mut SessionStatus,
    ) -> SearchResult<()> {
        let audit = session.audit();
        audit.record_session(&session.record())?;
        audit.record_invocation(&session.invocation)?;

        status.mark_running();
        info!(
            "Starting search session {} with {} trials in {}",
            session.id,
            session.total_trials,
            session.output_dir().display()
        );

        for trial_number in 1..=session.total_trials {
            let configuration = self.sampler.sample(&session.space);
            let mut trial = Trial::new(session.id, trial_number, configuration);
            audit.record_trial(&trial.record())?;

            status.trials_attempted += 1;
            match self.runner.run(&mut trial) {
                TrialOutcome::Completed => {
                    status.trials_completed += 1;
                    info!("Trial {}/{} completed", trial_number, session.total_trials);
                }
                TrialOutcome::RecoverableFailure(reason) => {
                    status.trials_recovered += 1;
                    warn!(
                        "Trial {}/{} failed with numeric instability, continuing: {}",
                        trial_number, session.total_trials, reason
                    );
                }
                TrialOutcome::FatalFailure(reason) => {
                    return Err(SearchError::TrialFailed {
                        trial_number,
                        reason,
                    });
                }
            }
        }

        Ok(())
    }
}
