//! Run configuration and wiring of the production components.

use crate::analysis::ModelAnalyzer;
use crate::annotator::Annotator;
use crate::batch::{BatchRunner, Layout};
use crate::classifier::OnnxEmotionClassifier;
use crate::cooldown::{Cooldown, CooldownMode, DEFAULT_COOLDOWN};
use crate::detector::create_detector;
use crate::speech::{CommandSpeaker, SilentSpeaker, SpeechConfig, Speaker};
use crate::text::GlyphPainter;
use crate::video::FfmpegBackend;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `Input/` and `Output/`
    pub base_dir: PathBuf,
    pub detector: String,
    pub model_dir: PathBuf,
    pub emotion_model: PathBuf,
    pub threshold: f32,
    pub cooldown: Duration,
    pub per_emotion_cooldown: bool,
    pub mute: bool,
    pub speech_program: Option<String>,
    pub speech: SpeechConfig,
    pub font: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            detector: "rustface".to_string(),
            model_dir: PathBuf::from("model"),
            emotion_model: PathBuf::from("model/emotion.onnx"),
            threshold: 0.5,
            cooldown: DEFAULT_COOLDOWN,
            per_emotion_cooldown: true,
            mute: false,
            speech_program: None,
            speech: SpeechConfig::default(),
            font: None,
        }
    }
}

impl Config {
    pub fn layout(&self) -> Layout {
        Layout::under(&self.base_dir)
    }

    pub fn cooldown(&self) -> Cooldown {
        Cooldown::new(
            self.cooldown,
            CooldownMode::from_per_emotion(self.per_emotion_cooldown),
        )
    }

    pub fn speaker(&self) -> Box<dyn Speaker> {
        if self.mute {
            Box::new(SilentSpeaker)
        } else {
            Box::new(CommandSpeaker::new(
                self.speech_program.clone(),
                self.speech.clone(),
            ))
        }
    }

    /// Load models and codecs and assemble the batch runner.
    pub fn build_runner(&self) -> Result<BatchRunner> {
        info!("Initializing face detector: {}", self.detector);
        let detector = create_detector(&self.detector, &self.model_dir)
            .context("Failed to initialize face detector")?;
        let classifier = OnnxEmotionClassifier::load(&self.emotion_model)
            .context("Failed to load emotion model")?;
        let analyzer = ModelAnalyzer::new(detector, Box::new(classifier), self.threshold);

        let painter = GlyphPainter::discover(self.font.as_deref())
            .context("Failed to load overlay font")?;
        let annotator = Annotator::new(Box::new(painter), self.speaker(), self.cooldown());

        let video = FfmpegBackend::new().context("Failed to initialize ffmpeg")?;

        Ok(BatchRunner::new(
            self.layout(),
            Box::new(analyzer),
            annotator,
            Box::new(video),
        ))
    }
}
