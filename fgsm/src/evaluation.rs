use std::{fmt::Write, ops::Add};

use log::info;
use machine_learning::{Classifier, arch::Model, dataset::Dataset};
use ndarray::{ArrayView4, s};
use rayon::prelude::*;
use serde::Serialize;

use crate::{FgsmAttack, FgsmErr, Result};

/// The amount of samples attacked together.
const CHUNK_SIZE: usize = 50;

const RULE_WIDTH: usize = 72;

/// The outcome of attacking a set of samples with a single epsilon. Rates are percentages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvalReport {
    pub epsilon: f32,
    pub samples: usize,
    pub clean_accuracy: f32,
    pub adversarial_accuracy: f32,
    pub accuracy_drop: f32,
    pub attack_success_rate: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tally {
    total: usize,
    correct_clean: usize,
    correct_adv: usize,
    flipped: usize,
}

impl Add for Tally {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total: self.total + rhs.total,
            correct_clean: self.correct_clean + rhs.correct_clean,
            correct_adv: self.correct_adv + rhs.correct_adv,
            flipped: self.flipped + rhs.flipped,
        }
    }
}

impl Tally {
    fn into_report(self, epsilon: f32) -> EvalReport {
        let percent = |count: usize| count as f32 / self.total as f32 * 100.;

        EvalReport {
            epsilon,
            samples: self.total,
            clean_accuracy: percent(self.correct_clean),
            adversarial_accuracy: percent(self.correct_adv),
            accuracy_drop: (self.correct_clean as f32 - self.correct_adv as f32)
                / self.total as f32
                * 100.,
            attack_success_rate: percent(self.flipped),
        }
    }
}

/// Attacks the first `num_samples` samples of `dataset` with their true labels and measures how
/// the classifier's accuracy degrades.
///
/// # Arguments
/// * `classifier` - The attacked classifier.
/// * `dataset` - The labeled samples, taken in their stored order.
/// * `epsilon` - The perturbation magnitude.
/// * `num_samples` - The maximum amount of samples to evaluate.
///
/// # Returns
/// The evaluation report, or an error if there's nothing to evaluate or the epsilon is invalid.
pub fn evaluate<M>(
    classifier: &Classifier<M>,
    dataset: &Dataset,
    epsilon: f32,
    num_samples: usize,
) -> Result<EvalReport>
where
    M: Model + Sync,
{
    let attack = FgsmAttack::new(epsilon)?;

    let n = num_samples.min(dataset.len());
    if n == 0 {
        return Err(FgsmErr::EmptyEvaluation);
    }

    let images = dataset.images().slice_move(s![..n, .., .., ..]);
    let labels = &dataset.labels()[..n];

    let tally = labels
        .par_chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let start = i * CHUNK_SIZE;
            let x = images.slice(s![start..start + chunk.len(), .., .., ..]);
            tally_chunk(classifier, &attack, x, chunk)
        })
        .try_reduce(Tally::default, |a, b| Ok(a + b))?;

    let report = tally.into_report(epsilon);
    info!(
        epsilon = epsilon,
        samples = n;
        "clean {:.2}%, adversarial {:.2}%",
        report.clean_accuracy,
        report.adversarial_accuracy
    );

    Ok(report)
}

fn tally_chunk<M: Model>(
    classifier: &Classifier<M>,
    attack: &FgsmAttack,
    images: ArrayView4<f32>,
    labels: &[usize],
) -> Result<Tally> {
    let clean = classifier.predict(images)?;
    let adv_images = attack.generate(classifier, images, labels)?;
    let adv = classifier.predict(adv_images.view())?;

    let mut tally = Tally {
        total: labels.len(),
        ..Tally::default()
    };

    for ((&label, &clean), &adv) in labels.iter().zip(&clean).zip(&adv) {
        tally.correct_clean += usize::from(clean == label);
        tally.correct_adv += usize::from(adv == label);
        tally.flipped += usize::from(clean != adv);
    }

    Ok(tally)
}

/// Runs `evaluate` once per epsilon, in order.
pub fn sweep<M>(
    classifier: &Classifier<M>,
    dataset: &Dataset,
    epsilons: &[f32],
    num_samples: usize,
) -> Result<Vec<EvalReport>>
where
    M: Model + Sync,
{
    epsilons
        .iter()
        .map(|&epsilon| evaluate(classifier, dataset, epsilon, num_samples))
        .collect()
}

/// Renders the reports of a sweep as a fixed width table.
pub fn render_table(reports: &[EvalReport], num_samples: usize) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    let mut out = String::new();
    // writing to a String never fails
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "FGSM Attack Robustness Evaluation");
    let _ = writeln!(
        out,
        "Model: SimpleCNN  |  Dataset: MNIST (first {num_samples} test samples)"
    );
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(
        out,
        "{:>8}  {:>11}  {:>10}  {:>10}  {:>15}",
        "Epsilon", "Clean Acc.", "Adv. Acc.", "Acc. Drop", "Attack Success"
    );
    let _ = writeln!(out, "{light}");

    for report in reports {
        let _ = writeln!(
            out,
            "{:>8.2}  {:>10.2}%  {:>9.2}%  {:>9.2}%  {:>14.2}%",
            report.epsilon,
            report.clean_accuracy,
            report.adversarial_accuracy,
            report.accuracy_drop,
            report.attack_success_rate
        );
    }

    let _ = writeln!(out, "{heavy}");
    out
}
