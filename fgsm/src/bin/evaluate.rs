use anyhow::{Context, Result};
use fgsm::{
    config::EvalConfig,
    evaluation::{render_table, sweep},
    model::simple_cnn,
};
use machine_learning::{
    Classifier,
    dataset::mnist::{self, Split},
};

fn main() -> Result<()> {
    env_logger::init();

    let config = EvalConfig::from_env()?;

    let classifier = Classifier::from_checkpoint(&config.checkpoint, simple_cnn())
        .with_context(|| format!("loading checkpoint {}", config.checkpoint.display()))?;
    let dataset = mnist::load(&config.data_dir, Split::Test)
        .with_context(|| format!("loading MNIST from {}", config.data_dir.display()))?
        .take(config.num_samples);

    let reports = sweep(&classifier, &dataset, &config.epsilons, dataset.len())?;
    print!("{}", render_table(&reports, dataset.len()));

    Ok(())
}
