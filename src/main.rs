use anyhow::Result;
use clap::Parser;
use log::info;
use mood_mirror::Config;
use mood_mirror::speech::SpeechConfig;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Annotate faces with their emotions in batches of images and videos")]
struct Args {
    /// Directory containing Input/ and Output/
    #[clap(long, default_value = ".")]
    base_dir: PathBuf,

    /// Face detector to use (rustface, etc.)
    #[clap(long, default_value = "rustface")]
    detector: String,

    /// Where detector models are stored (downloaded on first use)
    #[clap(long, default_value = "model")]
    model_dir: PathBuf,

    /// ONNX emotion classifier (64x64 grayscale in, 7 scores out)
    #[clap(long, default_value = "model/emotion.onnx")]
    emotion_model: PathBuf,

    /// Confidence threshold for face detection (0.0-1.0)
    #[clap(short, long, default_value = "0.5")]
    threshold: f32,

    /// Minimum seconds between two compliments
    #[clap(long, default_value = "5")]
    cooldown_secs: u64,

    /// Use one cooldown for all emotions instead of one per emotion
    #[clap(long)]
    shared_cooldown: bool,

    /// Do not speak compliments
    #[clap(long)]
    mute: bool,

    /// Text-to-speech program (defaults to espeak-ng, or say on macOS)
    #[clap(long)]
    speech_program: Option<String>,

    /// Speech rate in words per minute
    #[clap(long, default_value = "150")]
    speech_rate: u32,

    /// Speech volume (0.0-1.0)
    #[clap(long, default_value = "0.8")]
    volume: f32,

    /// TrueType font for overlay text
    #[clap(long)]
    font: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            base_dir: args.base_dir,
            detector: args.detector,
            model_dir: args.model_dir,
            emotion_model: args.emotion_model,
            threshold: args.threshold,
            cooldown: Duration::from_secs(args.cooldown_secs),
            per_emotion_cooldown: !args.shared_cooldown,
            mute: args.mute,
            speech_program: args.speech_program,
            speech: SpeechConfig {
                rate: args.speech_rate,
                volume: args.volume,
            },
            font: args.font,
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

/// Main program logic
fn run(args: Args) -> Result<()> {
    init_logger();
    info!("Starting MoodLyft Mirror: input emotion analyzer");

    let config = Config::from(args);
    let start_time = Instant::now();
    let mut runner = config.build_runner()?;
    let summary = runner.run()?;

    info!(
        "Processing complete: {} images, {} videos, {} skipped in {} seconds",
        summary.images,
        summary.videos,
        summary.skipped,
        start_time.elapsed().as_secs()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    run(args)
}
