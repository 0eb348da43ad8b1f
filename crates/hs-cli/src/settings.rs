//! Command-line settings for a mitosis-detection search and the search
//! space they declare.

use clap::Parser;
use hs_optimizer::{invalid_space, SearchResult, SearchSpace};
use serde::Serialize;
use std::path::PathBuf;

/// Random hyperparameter search over the mitosis-detection trainer.
#[derive(Debug, Clone, PartialEq, Parser, Serialize)]
#[command(name = "hypersearch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the generated image patches containing `train` & `val` folders
    #[arg(long)]
    pub patches_path: PathBuf,

    /// Parent path in which to store experiment folders and audit files
    #[arg(long, default_value = "experiments/mitoses/hyp")]
    pub exp_parent_path: PathBuf,

    /// Names of models to choose from (e.g. logreg, vgg, vgg19, resnet)
    #[arg(long, num_args = 1.., default_values = ["vgg", "resnet"])]
    pub models: Vec<String>,

    /// Optional initial weights; requires `--models` to name a single compatible model
    #[arg(long)]
    pub model_weights: Option<PathBuf>,

    /// Length to which the square patches are resized
    #[arg(long, default_value_t = 64)]
    pub patch_size: u32,

    /// Training batch sizes to choose from
    #[arg(long, num_args = 1.., default_values = ["32"])]
    pub train_batch_sizes: Vec<u32>,

    /// Validation batch size for all experiments
    #[arg(long, default_value_t = 32)]
    pub val_batch_size: u32,

    /// Epochs for training the new classifier layers
    #[arg(long, default_value_t = 5)]
    pub clf_epochs: u32,

    /// Epochs for fine-tuning the unfrozen layers
    #[arg(long, default_value_t = 5)]
    pub finetune_epochs: u32,

    /// Half-open interval for the classifier learning rate
    #[arg(long, num_args = 2, value_names = ["LOWER", "UPPER"], default_values = ["1e-5", "1e-2"], allow_negative_numbers = true)]
    pub clf_lr_range: Vec<f64>,

    /// Half-open interval for the fine-tuning learning rate
    #[arg(long, num_args = 2, value_names = ["LOWER", "UPPER"], default_values = ["1e-7", "1e-2"], allow_negative_numbers = true)]
    pub finetune_lr_range: Vec<f64>,

    /// Half-open interval for the fine-tuning momentum
    #[arg(long, num_args = 2, value_names = ["LOWER", "UPPER"], default_values = ["0.85", "0.95"], allow_negative_numbers = true)]
    pub finetune_momentum_range: Vec<f64>,

    /// Numbers of layers at the end of the pretrained model to fine-tune (-1 for all)
    #[arg(long, num_args = 1.., default_values = ["0", "-1"], allow_negative_numbers = true)]
    pub finetune_layers: Vec<i32>,

    /// Half-open interval for the amount of l2 weight regularization
    #[arg(long, num_args = 2, value_names = ["LOWER", "UPPER"], default_values = ["0", "1e-2"], allow_negative_numbers = true)]
    pub l2_range: Vec<f64>,

    /// Regularize biases
    #[arg(long)]
    pub reg_biases: bool,

    /// Skip regularization of the logits-producing layer
    #[arg(long)]
    pub skip_reg_final: bool,

    /// Apply random augmentation to the training images (default)
    #[arg(long, conflicts_with = "no_augment")]
    pub augment: bool,

    /// Do not apply random augmentation to the training images
    #[arg(long)]
    pub no_augment: bool,

    /// Use noise marginalization when evaluating the validation set
    #[arg(long)]
    pub marginalize: bool,

    /// Oversample the minority mitosis class via class-aware sampling
    #[arg(long)]
    pub oversample: bool,

    /// Number of GPUs to use for data parallelism
    #[arg(long, default_value_t = 1)]
    pub num_gpus: u32,

    /// Threads for dataset parallel processing
    #[arg(long, default_value_t = 5)]
    pub threads: u32,

    /// Number of batches to prefetch
    #[arg(long, default_value_t = 100)]
    pub prefetch_batches: u32,

    /// Steps between logging during training
    #[arg(long, default_value_t = 100)]
    pub log_interval: u32,

    /// Number of experiments to run
    #[arg(long, default_value_t = 100)]
    pub num_experiments: usize,

    /// Seed for the sampler; omitted means OS entropy
    #[arg(long)]
    pub seed: Option<u64>,

    /// Training program launched once per experiment
    #[arg(long)]
    pub trainer: PathBuf,

    /// Extra argument passed to the training program before the sampled parameters
    #[arg(long = "trainer-arg", allow_hyphen_values = true)]
    pub trainer_args: Vec<String>,

    /// Exit status the training program uses to report NaN/Inf divergence
    #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
    pub divergence_exit_code: i32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn reg_final(&self) -> bool {
        !self.skip_reg_final
    }

    pub fn augment(&self) -> bool {
        !self.no_augment
    }

    /// The search space declared by these settings.
    ///
    /// Every external training parameter appears exactly once, in the order
    /// the trainer documents them.
    pub fn search_space(&self) -> SearchResult<SearchSpace> {
        if self.model_weights.is_some() && self.models.len() != 1 {
            return Err(invalid_space!(
                "--model-weights requires exactly one model, got {:?}",
                self.models
            ));
        }

        let mut builder = SearchSpace::builder()
            .fixed("patches_path", self.patches_path.to_string_lossy().into_owned())
            .fixed("exp_parent_path", self.exp_parent_path.to_string_lossy().into_owned())
            .discrete("model", self.models.iter().cloned());
        if let Some(weights) = &self.model_weights {
            builder = builder.fixed("model_weights", weights.to_string_lossy().into_owned());
        }

        let (clf_lr_low, clf_lr_high) = bounds("clf_lr", &self.clf_lr_range)?;
        let (ft_lr_low, ft_lr_high) = bounds("finetune_lr", &self.finetune_lr_range)?;
        let (momentum_low, momentum_high) = bounds("finetune_momentum", &self.finetune_momentum_range)?;
        let (l2_low, l2_high) = bounds("l2", &self.l2_range)?;

        builder
            .fixed("patch_size", self.patch_size)
            .discrete("train_batch_size", self.train_batch_sizes.iter().copied())
            .fixed("val_batch_size", self.val_batch_size)
            .fixed("clf_epochs", self.clf_epochs)
            .fixed("finetune_epochs", self.finetune_epochs)
            .continuous("clf_lr", clf_lr_low, clf_lr_high)
            .continuous("finetune_lr", ft_lr_low, ft_lr_high)
            .continuous("finetune_momentum", momentum_low, momentum_high)
            .discrete("finetune_layers", self.finetune_layers.iter().copied())
            .continuous("l2", l2_low, l2_high)
            .flag("reg_biases", self.reg_biases)
            .flag("reg_final", self.reg_final())
            .flag("augment", self.augment())
            .flag("marginalize", self.marginalize)
            .flag("oversample", self.oversample)
            .fixed("num_gpus", self.num_gpus)
            .fixed("threads", self.threads)
            .fixed("prefetch_batches", self.prefetch_batches)
            .fixed("log_interval", self.log_interval)
            .build()
    }

    /// Arguments that parse back into exactly these settings.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--patches-path={}", self.patches_path.display()),
            format!("--exp-parent-path={}", self.exp_parent_path.display()),
        ];

        push_list(&mut args, "--models", &self.models);
        if let Some(weights) = &self.model_weights {
            args.push(format!("--model-weights={}", weights.display()));
        }
        args.push(format!("--patch-size={}", self.patch_size));
        push_list(&mut args, "--train-batch-sizes", &self.train_batch_sizes);
        args.push(format!("--val-batch-size={}", self.val_batch_size));
        args.push(format!("--clf-epochs={}", self.clf_epochs));
        args.push(format!("--finetune-epochs={}", self.finetune_epochs));
        push_list(&mut args, "--clf-lr-range", &self.clf_lr_range);
        push_list(&mut args, "--finetune-lr-range", &self.finetune_lr_range);
        push_list(&mut args, "--finetune-momentum-range", &self.finetune_momentum_range);
        push_list(&mut args, "--finetune-layers", &self.finetune_layers);
        push_list(&mut args, "--l2-range", &self.l2_range);

        for (set, flag) in [
            (self.reg_biases, "--reg-biases"),
            (self.skip_reg_final, "--skip-reg-final"),
            (self.no_augment, "--no-augment"),
            (self.marginalize, "--marginalize"),
            (self.oversample, "--oversample"),
        ] {
            if set {
                args.push(flag.to_string());
            }
        }
        // `--augment` is the default; keep it only if it was given explicitly.
        if self.augment {
            args.push("--augment".to_string());
        }

        args.push(format!("--num-gpus={}", self.num_gpus));
        args.push(format!("--threads={}", self.threads));
        args.push(format!("--prefetch-batches={}", self.prefetch_batches));
        args.push(format!("--log-interval={}", self.log_interval));
        args.push(format!("--num-experiments={}", self.num_experiments));
        if let Some(seed) = self.seed {
            args.push(format!("--seed={seed}"));
        }
        args.push(format!("--trainer={}", self.trainer.display()));
        for arg in &self.trainer_args {
            args.push(format!("--trainer-arg={arg}"));
        }
        args.push(format!("--divergence-exit-code={}", self.divergence_exit_code));
        args.push(format!("--log-level={}", self.log_level));

        args
    }
}

fn bounds(name: &str, range: &[f64]) -> SearchResult<(f64, f64)> {
    match range {
        [lower, upper] => Ok((*lower, *upper)),
        _ => Err(invalid_space!(
            "range for '{name}' needs a lower and an upper bound, got {range:?}"
        )),
    }
}

fn push_list<T: std::fmt::Display>(args: &mut Vec<String>, flag: &str, values: &[T]) {
    args.push(flag.to_string());
    args.extend(values.iter().map(ToString::to_string));
}
