//! Settings of the fgsm binaries. Every field has a default and can be overridden through an
//! environment variable.

use std::{env, num::NonZeroUsize, path::PathBuf, str::FromStr};

use crate::{FgsmErr, Result};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_CHECKPOINT: &str = "mnist_cnn.safetensors";
pub const DEFAULT_EPSILONS: [f32; 7] = [0., 0.05, 0.1, 0.15, 0.2, 0.25, 0.3];
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Settings of `fgsm-train`.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainConfig {
    pub data_dir: PathBuf,
    pub checkpoint: PathBuf,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    /// Batches between progress logs, 0 disables them.
    pub log_every: usize,
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.into(),
            checkpoint: DEFAULT_CHECKPOINT.into(),
            epochs: NonZeroUsize::MIN,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: 0.001,
            log_every: 100,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the config reading every variable through `lookup`.
    ///
    /// # Returns
    /// An error naming the first variable whose value can't be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let learning_rate = parse_var(&lookup, "TRAIN_LR", defaults.learning_rate)?;
        if !learning_rate.is_finite() || learning_rate <= 0. {
            return Err(FgsmErr::Config {
                var: "TRAIN_LR",
                value: learning_rate.to_string(),
            });
        }

        Ok(Self {
            data_dir: parse_var(&lookup, "MNIST_DIR", defaults.data_dir)?,
            checkpoint: parse_var(&lookup, "FGSM_CHECKPOINT", defaults.checkpoint)?,
            epochs: parse_var(&lookup, "TRAIN_EPOCHS", defaults.epochs)?,
            batch_size: parse_var(&lookup, "TRAIN_BATCH_SIZE", defaults.batch_size)?,
            learning_rate,
            log_every: parse_var(&lookup, "TRAIN_LOG_EVERY", defaults.log_every)?,
            seed: parse_opt_var(&lookup, "FGSM_SEED")?,
        })
    }
}

/// Settings of `fgsm-evaluate`.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalConfig {
    pub data_dir: PathBuf,
    pub checkpoint: PathBuf,
    pub num_samples: usize,
    pub epsilons: Vec<f32>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.into(),
            checkpoint: DEFAULT_CHECKPOINT.into(),
            num_samples: 1000,
            epsilons: DEFAULT_EPSILONS.to_vec(),
        }
    }
}

impl EvalConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the config reading every variable through `lookup`. `EVAL_EPSILONS` is a comma
    /// separated list.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let epsilons = match lookup("EVAL_EPSILONS") {
            Some(value) => parse_list(&value).ok_or(FgsmErr::Config {
                var: "EVAL_EPSILONS",
                value,
            })?,
            None => defaults.epsilons,
        };

        Ok(Self {
            data_dir: parse_var(&lookup, "MNIST_DIR", defaults.data_dir)?,
            checkpoint: parse_var(&lookup, "FGSM_CHECKPOINT", defaults.checkpoint)?,
            num_samples: parse_var(&lookup, "EVAL_SAMPLES", defaults.num_samples)?,
            epsilons,
        })
    }
}

/// Settings of `fgsm-probe`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeConfig {
    pub data_dir: PathBuf,
    pub checkpoint: PathBuf,
    pub epsilon: f32,
    pub seed: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.into(),
            checkpoint: DEFAULT_CHECKPOINT.into(),
            epsilon: 0.2,
            seed: None,
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            data_dir: parse_var(&lookup, "MNIST_DIR", defaults.data_dir)?,
            checkpoint: parse_var(&lookup, "FGSM_CHECKPOINT", defaults.checkpoint)?,
            epsilon: parse_var(&lookup, "FGSM_EPSILON", defaults.epsilon)?,
            seed: parse_opt_var(&lookup, "FGSM_SEED")?,
        })
    }
}

/// Parses the variable `var`, falling back to `default` when it's unset.
///
/// # Returns
/// A `FgsmErr::Config` if the variable is set but can't be parsed as a `T`.
pub fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt_var(lookup, var)?.unwrap_or(default))
}

/// Parses the variable `var`, `None` when it's unset.
pub fn parse_opt_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };

    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(FgsmErr::Config { var, value }),
    }
}

fn parse_list(value: &str) -> Option<Vec<f32>> {
    let list: Vec<f32> = value
        .split(',')
        .map(|item| item.trim().parse().ok())
        .collect::<Option<_>>()?;

    (!list.is_empty()).then_some(list)
}
