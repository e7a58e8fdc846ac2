use anyhow::{Context, Result, ensure};
use fgsm::{FgsmAttack, config::ProbeConfig, model::simple_cnn};
use log::info;
use machine_learning::{
    Classifier,
    dataset::mnist::{self, Split},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn main() -> Result<()> {
    env_logger::init();

    let config = ProbeConfig::from_env()?;
    let attack = FgsmAttack::new(config.epsilon)?;

    let classifier = Classifier::from_checkpoint(&config.checkpoint, simple_cnn())
        .with_context(|| format!("loading checkpoint {}", config.checkpoint.display()))?;
    let dataset = mnist::load(&config.data_dir, Split::Test)
        .with_context(|| format!("loading MNIST from {}", config.data_dir.display()))?;
    ensure!(!dataset.is_empty(), "the test split is empty");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let index = rng.random_range(0..dataset.len());
    let (image, label) = dataset
        .sample(index)
        .context("sample index out of range")?;
    info!(index = index, label = label; "attacking sample");

    let clean = classifier.predict(image)?;
    let adversarial = attack.generate(&classifier, image, &[label])?;
    let attacked = classifier.predict(adversarial.view())?;

    println!("Original: {}", clean[0]);
    println!("Adversarial: {}", attacked[0]);

    Ok(())
}
