use anyhow::Context;
use clap::Parser;
use hs_optimizer::{Sampler, SearchLoop, SearchSession};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;
mod trainer;

use settings::Cli;
use trainer::CommandTrainer;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let space = cli.search_space()?;
    let session = SearchSession::create(&cli.exp_parent_path, space, cli.num_experiments)
        .with_context(|| format!("cannot use {} for audit files", cli.exp_parent_path.display()))?
        .with_settings(&cli)?
        .with_invocation(std::iter::once("hypersearch".to_string()).chain(cli.to_args()));

    let sampler = match cli.seed {
        Some(seed) => Sampler::seeded(seed),
        None => Sampler::from_entropy(),
    };
    let trainer = CommandTrainer::new(
        cli.trainer.clone(),
        cli.trainer_args.clone(),
        cli.divergence_exit_code,
    );

    let mut search = SearchLoop::new(sampler, trainer);
    let status = search.execute(&session)?;

    info!(
        "Hyperparameter search done: {} trials, {} completed, {} diverged",
        status.trials_attempted, status.trials_completed, status.trials_recovered
    );
    Ok(())
}
