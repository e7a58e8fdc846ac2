use anyhow::{Context, Result};
use fgsm::{config::TrainConfig, model::simple_cnn};
use log::info;
use machine_learning::{
    arch::{Model, loss::CrossEntropy},
    checkpoint,
    dataset::mnist::{self, Split},
    initialization::init_params,
    optimization::Adam,
    training::Trainer,
};
use rand::{SeedableRng, rngs::StdRng};

fn main() -> Result<()> {
    env_logger::init();

    let config = TrainConfig::from_env()?;
    info!("training with {config:?}");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut dataset = mnist::load(&config.data_dir, Split::Train)
        .with_context(|| format!("loading MNIST from {}", config.data_dir.display()))?;

    let model = simple_cnn();
    let mut params = init_params(&model, &mut rng)?;
    let optimizer = Adam::with_learning_rate(model.size(), config.learning_rate);

    let mut trainer = Trainer::new(
        model,
        optimizer,
        CrossEntropy,
        config.batch_size,
        config.epochs,
        rng,
    )
    .with_log_every(config.log_every);
    let losses = trainer.train(&mut params, &mut dataset)?;
    info!("epoch losses: {losses:?}");
    println!("Training done");

    checkpoint::save(&config.checkpoint, trainer.model(), &params)
        .with_context(|| format!("saving checkpoint to {}", config.checkpoint.display()))?;

    Ok(())
}
