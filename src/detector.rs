use image::RgbImage;
use log::{info, warn};
use rustface::{Detector, ImageData};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SEETA_MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";

const SEETA_MODEL_URLS: &[&str] = &[
    // Direct link from the raw GitHub content
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin",
    // Alternative raw content URL
    "https://raw.githubusercontent.com/atomashpolskiy/rustface/master/model/seeta_fd_frontal_v1.0.bin",
];

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("unknown detector: {0}")]
    Unknown(String),
    #[error("failed to download model from all sources (last error: {last}); \
             download it manually from https://github.com/atomashpolskiy/rustface/tree/master/model \
             and place it at {path}")]
    Download { last: String, path: PathBuf },
    #[error("failed to load detector model {path}: {reason}")]
    Model { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Represents a detected face with bounding box and confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: i32,      // Left coordinate
    pub y: i32,      // Top coordinate
    pub width: i32,  // Width of bounding box
    pub height: i32, // Height of bounding box
    pub confidence: f32, // Detection confidence (0.0-1.0)
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Intersect with a `width` x `height` frame.
    /// Returns `(x, y, w, h)` or `None` when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.clamp(0, width as i32);
        let y0 = self.y.clamp(0, height as i32);
        let x1 = self.right().clamp(0, width as i32);
        let y1 = self.bottom().clamp(0, height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Trait for face detector implementations
pub trait FaceDetector {
    /// Detect faces in an image
    fn detect_faces(&mut self, image: &RgbImage, threshold: f32)
    -> Result<Vec<FaceBox>, DetectorError>;
}

/// RustFace (SeetaFace) detector implementation
pub struct RustFaceDetector {
    detector: Box<dyn Detector>,
}

impl RustFaceDetector {
    /// Load the SeetaFace model from `model_dir`, downloading it first if needed.
    pub fn new(model_dir: &Path) -> Result<Self, DetectorError> {
        let model_path = model_dir.join(SEETA_MODEL_FILE);

        if model_path.exists() {
            info!("Model already exists at: {:?}", model_path);
        } else {
            download_model(model_dir, &model_path)?;
        }

        let path_str = model_path.to_string_lossy();
        let detector =
            rustface::create_detector(&path_str).map_err(|e| DetectorError::Model {
                path: model_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { detector })
    }
}

fn download_model(model_dir: &Path, model_path: &Path) -> Result<(), DetectorError> {
    info!("Downloading face detection model...");
    std::fs::create_dir_all(model_dir)?;

    let mut last_error = String::from("no sources tried");
    for url in SEETA_MODEL_URLS {
        info!("Trying to download from: {}", url);

        match ureq::get(url).call() {
            Ok(response) => {
                let mut reader = response.into_reader();
                let mut file = std::fs::File::create(model_path)?;
                std::io::copy(&mut reader, &mut file)?;
                info!("Model downloaded successfully from {}", url);
                return Ok(());
            }
            Err(err) => {
                warn!("Failed to download from {}: {}", url, err);
                last_error = err.to_string();
            }
        }
    }

    Err(DetectorError::Download {
        last: last_error,
        path: model_path.to_path_buf(),
    })
}

impl FaceDetector for RustFaceDetector {
    fn detect_faces(
        &mut self,
        image: &RgbImage,
        threshold: f32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let gray_image = image::imageops::grayscale(image);

        // Convert to rustface ImageData format
        let (width, height) = gray_image.dimensions();
        let mut image_data = ImageData::new(gray_image.as_raw(), width, height);

        let faces = self.detector.detect(&mut image_data);

        let result = faces
            .into_iter()
            .filter(|face| face.score() >= f64::from(threshold))
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width() as i32,
                    height: bbox.height() as i32,
                    confidence: face.score() as f32,
                }
            })
            .collect();

        Ok(result)
    }
}

// Factory function to create detectors by name
pub fn create_detector(name: &str, model_dir: &Path) -> Result<Box<dyn FaceDetector>, DetectorError> {
    match name.to_lowercase().as_str() {
        "rustface" => Ok(Box::new(RustFaceDetector::new(model_dir)?)),
        _ => Err(DetectorError::Unknown(name.to_string())),
    }
}
