pub mod analysis;
pub mod annotator;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod cooldown;
pub mod detector;
pub mod emotion;
pub mod speech;
pub mod text;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use analysis::{DetectedFace, FaceAnalyzer, ModelAnalyzer};
pub use annotator::{Annotator, EmotionData};
pub use batch::{BatchRunner, BatchSummary, Layout};
pub use config::Config;
pub use detector::{FaceBox, FaceDetector, create_detector};
pub use emotion::{Emotion, EmotionScores};
