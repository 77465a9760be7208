use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("failed to launch speech program {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("speech program {program} exited with {status}")]
    Failed { program: String, status: String },
}

/// Voice settings applied to every utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Words per minute
    pub rate: u32,
    /// Loudness in [0, 1]
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: 150,
            volume: 0.8,
        }
    }
}

/// Text-to-speech sink. `speak` blocks until playback finishes.
pub trait Speaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;
}

/// Speaks through a system TTS program (`espeak-ng` or macOS `say`).
pub struct CommandSpeaker {
    program: String,
    config: SpeechConfig,
}

impl CommandSpeaker {
    pub fn new(program: Option<String>, config: SpeechConfig) -> Self {
        Self {
            program: program.unwrap_or_else(|| default_program().to_string()),
            config,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// macOS `say`, matched on the executable name only.
    fn is_say(&self) -> bool {
        Path::new(&self.program).file_stem() == Some(OsStr::new("say"))
    }

    fn args(&self, text: &str) -> Vec<String> {
        if self.is_say() {
            // `say` has no volume switch
            vec!["-r".into(), self.config.rate.to_string(), text.into()]
        } else {
            let amplitude = (self.config.volume.clamp(0.0, 1.0) * 200.0).round() as u32;
            vec![
                "-s".into(),
                self.config.rate.to_string(),
                "-a".into(),
                amplitude.to_string(),
                text.into(),
            ]
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let status = Command::new(&self.program)
            .args(self.args(text))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SpeechError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Speaker used with `--mute`.
#[derive(Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        log::debug!("Muted compliment: {}", text);
        Ok(())
    }
}

fn default_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}
