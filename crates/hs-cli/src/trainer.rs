//! Training procedure backed by an external program.

use hs_optimizer::{Trainer, TrainingError, TrainingParameters};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use tracing::{debug, warn};

/// Runs one child process per trial.
///
/// The child gets `base_args` followed by the trial's parameters. A clean
/// exit completes the trial; exiting with `divergence_exit_code` reports
/// numeric instability; everything else is fatal.
#[derive(Debug)]
pub struct CommandTrainer {
    program: PathBuf,
    base_args: Vec<String>,
    divergence_exit_code: i32,
    child: Option<Child>,
}

impl CommandTrainer {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>, divergence_exit_code: i32) -> Self {
        Self {
            program: program.into(),
            base_args,
            divergence_exit_code,
            child: None,
        }
    }

    fn classify(&self, status: ExitStatus) -> Result<(), TrainingError> {
        match status.code() {
            _ if status.success() => Ok(()),
            Some(code) if code == self.divergence_exit_code => Err(TrainingError::numeric_instability(
                format!("{} reported NaN/Inf divergence ({status})", self.program.display()),
            )),
            _ => Err(TrainingError::failed(format!(
                "{} exited unexpectedly ({status})",
                self.program.display()
            ))),
        }
    }
}

impl Trainer for CommandTrainer {
    fn train(&mut self, params: &TrainingParameters) -> Result<(), TrainingError> {
        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(params.to_args());
        debug!("Spawning trainer: {:?}", command);

        let child = command.spawn().map_err(|e| {
            TrainingError::failed(format!("failed to start {}: {e}", self.program.display()))
        })?;
        let status = self
            .child
            .insert(child)
            .wait()
            .map_err(|e| TrainingError::failed(format!("failed to wait for trainer: {e}")))?;
        self.child = None;

        self.classify(status)
    }

    fn reset(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        warn!("Killing trainer process {} left over from the last trial", child.id());
        if let Err(e) = child.kill() {
            warn!("Failed to kill trainer process {}: {}", child.id(), e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap trainer process {}: {}", child.id(), e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use hs_optimizer::{Sampler, SearchSpace};
    use std::fs;
    use tempfile::TempDir;

    fn params() -> TrainingParameters {
        let space = SearchSpace::builder()
            .fixed("model", "vgg")
            .continuous("clf_lr", 1e-5, 1e-2)
            .flag("augment", false)
            .build()
            .unwrap();
        TrainingParameters::from(&Sampler::seeded(8).sample(&space))
    }

    fn shell(script: &str) -> CommandTrainer {
        CommandTrainer::new("sh", vec!["-c".into(), script.into(), "trainer".into()], 3)
    }

    #[test]
    fn clean_exit_completes() {
        let mut trainer = shell("exit 0");
        assert_eq!(trainer.train(&params()), Ok(()));
        assert!(trainer.child.is_none());
    }

    #[test]
    fn divergence_exit_code_is_numeric_instability() {
        let mut trainer = shell("exit 3");
        assert!(matches!(
            trainer.train(&params()),
            Err(TrainingError::NumericInstability { .. })
        ));
    }

    #[test]
    fn other_exit_codes_are_fatal() {
        let mut trainer = shell("exit 1");
        assert!(matches!(trainer.train(&params()), Err(TrainingError::Failed { .. })));
    }

    #[test]
    fn missing_program_is_fatal() {
        let mut trainer = CommandTrainer::new("/nonexistent/train_mitoses", Vec::new(), 3);
        match trainer.train(&params()) {
            Err(TrainingError::Failed { message }) => assert!(message.contains("failed to start")),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn parameters_are_passed_after_base_args() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("argv.txt");
        let script = format!(r#"for a in "$@"; do echo "$a"; done > '{}'"#, out.display());
        let mut trainer = shell(&script);
        let params = params();

        trainer.train(&params).unwrap();

        let received: Vec<String> = fs::read_to_string(&out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(received, params.to_args());
        assert_eq!(received[0], "--model=vgg");
        assert_eq!(received[2], "--no_augment");
    }

    #[test]
    fn reset_kills_a_leftover_child() {
        let mut trainer = shell("exit 0");
        trainer.child = Some(Command::new("sleep").arg("30").spawn().unwrap());

        trainer.reset();

        assert!(trainer.child.is_none());
    }

    #[test]
    fn reset_without_child_is_a_no_op() {
        let mut trainer = shell("exit 0");
        trainer.reset();
        trainer.reset();
        assert!(trainer.child.is_none());
    }
}
