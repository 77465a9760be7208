//! Facial emotion classification via ONNX Runtime.
//!
//! Expects a FER2013-style network: one 64x64 grayscale face crop in,
//! seven emotion scores out.

use crate::emotion::{Emotion, EmotionScores};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: u32 = 64;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("emotion model not found: {0}")]
    ModelNotFound(String),
    #[error("unexpected model output: expected {expected} scores, got {actual}")]
    OutputShape { expected: usize, actual: usize },
    #[error("empty face crop")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Turns a face crop into emotion confidences.
pub trait EmotionClassifier {
    fn classify(&mut self, face: &GrayImage) -> Result<EmotionScores, ClassifierError>;
}

pub struct OnnxEmotionClassifier {
    session: Session,
}

impl OnnxEmotionClassifier {
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        log::info!("Loaded emotion model from {:?}", model_path);
        Ok(Self { session })
    }

    fn preprocess(face: &GrayImage) -> Array4<f32> {
        let resized = image::imageops::resize(face, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let size = INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = f32::from(pixel.0[0]) / 255.0;
        }
        tensor
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, face: &GrayImage) -> Result<EmotionScores, ClassifierError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(ClassifierError::EmptyCrop);
        }

        let input = Self::preprocess(face);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0].try_extract_tensor::<f32>()?;

        scores_from_raw(raw)
    }
}

/// Map raw network output onto labels, normalizing logits when needed.
pub(crate) fn scores_from_raw(raw: &[f32]) -> Result<EmotionScores, ClassifierError> {
    if raw.len() != Emotion::ALL.len() {
        return Err(ClassifierError::OutputShape {
            expected: Emotion::ALL.len(),
            actual: raw.len(),
        });
    }

    let probabilities = if is_distribution(raw) {
        raw.to_vec()
    } else {
        softmax(raw)
    };

    Ok(Emotion::ALL
        .iter()
        .zip(probabilities)
        .map(|(emotion, p)| (emotion.label(), p))
        .collect())
}

fn is_distribution(values: &[f32]) -> bool {
    let sum: f32 = values.iter().sum();
    values.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_probabilities_pass_through() {
        let raw = [0.0, 0.0, 0.0, 0.9, 0.05, 0.0, 0.05];
        let scores = scores_from_raw(&raw).unwrap();
        assert_eq!(scores.len(), 7);
        assert_relative_eq!(scores.get("happy").unwrap(), 0.9);
        assert_eq!(scores.dominant().map(|(label, _)| label), Some("happy"));
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let raw = [1.0, 2.0, 0.5, -1.0, 3.0, 0.0, 0.0];
        let scores = scores_from_raw(&raw).unwrap();
        let total: f32 = scores.iter().map(|(_, p)| p).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-5);
        assert_eq!(scores.dominant().map(|(label, _)| label), Some("sad"));
    }

    #[test]
    fn test_wrong_output_length() {
        let result = scores_from_raw(&[0.5, 0.5]);
        assert!(matches!(
            result,
            Err(ClassifierError::OutputShape {
                expected: 7,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let face = GrayImage::from_pixel(100, 80, image::Luma([255]));
        let tensor = OnnxEmotionClassifier::preprocess(&face);
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
        assert_relative_eq!(tensor[[0, 0, 10, 10]], 1.0);
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxEmotionClassifier::load(&dir.path().join("emotion.onnx"));
        assert!(matches!(result, Err(ClassifierError::ModelNotFound(_))));
    }
}
