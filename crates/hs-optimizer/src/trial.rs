//! Trial execution and lifecycle tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TrainingError;
use crate::params::TrainingParameters;
use crate::sampler::SampledConfiguration;

/// Unique search session identifier.
pub type SessionId = Uuid;

/// The external training procedure.
///
/// Implementations own whatever process-wide state training needs (device
/// memory, cached graphs, child processes). [`TrialRunner`] brackets every
/// call to [`Trainer::train`] with [`Trainer::acquire`] and [`Trainer::reset`].
pub trait Trainer {
    /// Prepare execution state for a new trial.
    fn acquire(&mut self) -> Result<(), TrainingError> {
        Ok(())
    }

    /// Run one training job to completion.
    fn train(&mut self, params: &TrainingParameters) -> Result<(), TrainingError>;

    /// Tear down and reinitialize all shared execution state.
    ///
    /// Called after every trial, whatever its outcome, and while unwinding
    /// if `train` panics.
    fn reset(&mut self);
}

impl<T: Trainer + ?Sized> Trainer for Box<T> {
    fn acquire(&mut self) -> Result<(), TrainingError> {
        (**self).acquire()
    }

    fn train(&mut self, params: &TrainingParameters) -> Result<(), TrainingError> {
        (**self).train(params)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Scope guard that resets the trainer when dropped.
pub struct ResetGuard<'a, T: Trainer + ?Sized> {
    trainer: &'a mut T,
}

impl<'a, T: Trainer + ?Sized> ResetGuard<'a, T> {
    pub fn new(trainer: &'a mut T) -> Self {
        Self { trainer }
    }
}

impl<T: Trainer + ?Sized> Deref for ResetGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.trainer
    }
}

impl<T: Trainer + ?Sized> DerefMut for ResetGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.trainer
    }
}

impl<T: Trainer + ?Sized> Drop for ResetGuard<'_, T> {
    fn drop(&mut self) {
        debug!("Resetting training execution state");
        self.trainer.reset();
    }
}

/// Classified result of one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TrialOutcome {
    Completed,
    /// Numeric divergence; the search carries on.
    RecoverableFailure(String),
    /// Environment or setup defect; the search stops.
    FatalFailure(String),
}

impl TrialOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFailure(_))
    }
}

impl From<Result<(), TrainingError>> for TrialOutcome {
    fn from(result: Result<(), TrainingError>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(TrainingError::NumericInstability { message }) => Self::RecoverableFailure(message),
            Err(TrainingError::Failed { message }) => Self::FatalFailure(message),
        }
    }
}

/// Where a trial is in its lifecycle.
///
/// `Pending → Running → Finished → Reset`; no step is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrialPhase {
    Pending,
    Running,
    Finished,
    Reset,
}

/// A single trial (one sampled configuration evaluated by the trainer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub id: Uuid,
    pub session_id: SessionId,
    /// 1-based position within the session.
    pub trial_number: usize,
    pub configuration: SampledConfiguration,
    pub phase: TrialPhase,
    pub outcome: Option<TrialOutcome>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl Trial {
    pub fn new(
        session_id: SessionId,
        trial_number: usize,
        configuration: SampledConfiguration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            trial_number,
            configuration,
            phase: TrialPhase::Pending,
            outcome: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            reset_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.phase, TrialPhase::Pending);
        self.phase = TrialPhase::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self, outcome: TrialOutcome) {
        debug_assert_eq!(self.phase, TrialPhase::Running);
        self.phase = TrialPhase::Finished;
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    pub fn mark_reset(&mut self) {
        debug_assert_eq!(self.phase, TrialPhase::Finished);
        self.phase = TrialPhase::Reset;
        self.reset_at = Some(Utc::now());
    }

    /// The audit entry written before the trial runs.
    pub fn record(&self) -> TrialRecord<'_> {
        TrialRecord {
            session_id: self.session_id,
            trial_id: self.id,
            trial_number: self.trial_number,
            created_at: self.created_at,
            configuration: &self.configuration,
        }
    }
}

/// Audit entry for one sampled configuration.
#[derive(Debug, Serialize)]
pub struct TrialRecord<'a> {
    pub session_id: SessionId,
    pub trial_id: Uuid,
    pub trial_number: usize,
    pub created_at: DateTime<Utc>,
    pub configuration: &'a SampledConfiguration,
}

/// Runs trials one at a time against a [`Trainer`].
#[derive(Debug)]
pub struct TrialRunner<T> {
    trainer: T,
}

impl<T: Trainer> TrialRunner<T> {
    pub fn new(trainer: T) -> Self {
        Self { trainer }
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn into_trainer(self) -> T {
        self.trainer
    }

    /// Execute `trial` and classify the result.
    ///
    /// The trainer is reset before this returns, on every path, including a
    /// panic inside the trainer.
    pub fn run(&mut self, trial: &mut Trial) -> TrialOutcome {
        let params = TrainingParameters::from(&trial.configuration);
        trial.mark_running();
        info!(
            trial = trial.trial_number,
            args = %params.to_args().join(" "),
            "Starting trial"
        );

        let outcome = {
            let mut scope = ResetGuard::new(&mut self.trainer);
            let result = scope.acquire().and_then(|()| scope.train(&params));
            let outcome = TrialOutcome::from(result);
            trial.mark_finished(outcome.clone());
            outcome
        };
        trial.mark_reset();

        outcome
    }
}
