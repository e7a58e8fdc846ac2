use actix_multipart::form::{MultipartForm, bytes::Bytes, text::Text};
use actix_web::{HttpResponse, web};
use base64::{Engine as _, engine::general_purpose};
use fgsm::FgsmAttack;
use log::{debug, info};
use machine_learning::{Classifier, arch::Model};
use ndarray::s;
use serde::{Deserialize, Serialize};

use crate::{ServerErr, imaging};

/// The epsilon used when the form doesn't carry one.
pub const DEFAULT_EPSILON: f32 = 0.1;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackResponse {
    pub clean_prediction: usize,
    pub adversarial_prediction: usize,
    pub attack_success: bool,
    /// Base64 encoded grayscale PNG of the perturbed input.
    pub adversarial_image: String,
}

#[derive(MultipartForm)]
pub struct AttackForm {
    pub file: Bytes,
    pub epsilon: Option<Text<f32>>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        message: "FGSM Adversarial Attack API is running".to_string(),
    })
}

pub async fn attack(
    classifier: web::Data<Classifier>,
    MultipartForm(form): MultipartForm<AttackForm>,
) -> Result<HttpResponse, ServerErr> {
    let epsilon = form.epsilon.map_or(DEFAULT_EPSILON, |e| e.into_inner());
    let bytes = form.file.data;
    debug!(size = bytes.len(), epsilon = epsilon; "attack requested");

    let classifier = classifier.into_inner();
    let response = web::block(move || run_attack(&*classifier, &bytes, epsilon)).await??;

    info!(
        clean = response.clean_prediction,
        adversarial = response.adversarial_prediction,
        epsilon = epsilon;
        "attack done"
    );

    Ok(HttpResponse::Ok().json(response))
}

/// Classifies the uploaded picture, attacks it using its own prediction as label and classifies
/// the result.
///
/// # Arguments
/// * `classifier` - The attacked classifier.
/// * `bytes` - The encoded picture, PNG or JPEG.
/// * `epsilon` - The perturbation magnitude.
pub fn run_attack<M: Model>(
    classifier: &Classifier<M>,
    bytes: &[u8],
    epsilon: f32,
) -> Result<AttackResponse, ServerErr> {
    let attack = FgsmAttack::new(epsilon)?;
    let image = imaging::preprocess(bytes).map_err(ServerErr::BadImage)?;

    let clean = classifier.predict(image.view())?;
    let adversarial = attack.generate(classifier, image.view(), &clean)?;
    let attacked = classifier.predict(adversarial.view())?;

    let png = imaging::encode_png(adversarial.slice(s![0, 0, .., ..])).map_err(ServerErr::Encode)?;

    Ok(AttackResponse {
        clean_prediction: clean[0],
        adversarial_prediction: attacked[0],
        attack_success: clean[0] != attacked[0],
        adversarial_image: general_purpose::STANDARD.encode(png),
    })
}
