use crate::classifier::{ClassifierError, EmotionClassifier};
use crate::detector::{DetectorError, FaceBox, FaceDetector};
use crate::emotion::EmotionScores;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("emotion classification failed: {0}")]
    Classifier(#[from] ClassifierError),
}

/// One face found in a frame, with its emotion confidences.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: FaceBox,
    pub emotions: EmotionScores,
}

impl DetectedFace {
    pub fn new(bbox: FaceBox, emotions: EmotionScores) -> Self {
        Self { bbox, emotions }
    }
}

/// Black-box face + emotion analysis of a whole frame.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError>;
}

/// Runs a face detector, then classifies each face crop.
pub struct ModelAnalyzer {
    detector: Box<dyn FaceDetector>,
    classifier: Box<dyn EmotionClassifier>,
    threshold: f32,
}

impl ModelAnalyzer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        classifier: Box<dyn EmotionClassifier>,
        threshold: f32,
    ) -> Self {
        Self {
            detector,
            classifier,
            threshold,
        }
    }
}

impl FaceAnalyzer for ModelAnalyzer {
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError> {
        let boxes = self.detector.detect_faces(frame, self.threshold)?;
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let gray = image::imageops::grayscale(frame);
        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let Some((x, y, w, h)) = bbox.clip_to(frame.width(), frame.height()) else {
                log::debug!("Dropping face outside frame: {:?}", bbox);
                continue;
            };
            let crop = image::imageops::crop_imm(&gray, x, y, w, h).to_image();
            let emotions = self.classifier.classify(&crop)?;
            faces.push(DetectedFace::new(bbox, emotions));
        }
        Ok(faces)
    }
}
