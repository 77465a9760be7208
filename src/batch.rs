use crate::analysis::FaceAnalyzer;
use crate::annotator::{Annotator, EmotionData};
use crate::video::{VideoBackend, VideoError, VideoReader, VideoWriter};
use anyhow::{Context, Result};
use image::{ImageError, ImageReader, RgbImage};
use log::{info, warn};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];
pub const OUTPUT_PREFIX: &str = "analyzed_";
/// Frames between progress lines while processing a video
const PROGRESS_INTERVAL: usize = 100;

/// Input and output directories of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub input_images: PathBuf,
    pub input_videos: PathBuf,
    pub output_images: PathBuf,
    pub output_videos: PathBuf,
}

impl Layout {
    /// The standard `Input/` and `Output/` tree below `base`.
    pub fn under(base: &Path) -> Self {
        Self {
            input_images: base.join("Input").join("Images"),
            input_videos: base.join("Input").join("Videos"),
            output_images: base.join("Output").join("analyzedImages"),
            output_videos: base.join("Output").join("analyzedVideos"),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.input_images,
            &self.input_videos,
            &self.output_images,
            &self.output_videos,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub images: usize,
    pub videos: usize,
    pub skipped: usize,
}

/// A file picked up from an input directory.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    pub path: PathBuf,
    pub name: OsString,
}

impl InputFile {
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

/// Files directly inside `dir` whose extension is in `extensions`, sorted by name.
pub fn list_inputs(dir: &Path, extensions: &[&str]) -> Result<Vec<InputFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(InputFile {
                name: entry.file_name().to_os_string(),
                path: entry.into_path(),
            });
        }
    }
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// `analyzed_<file name>`
pub fn output_name(name: &OsStr) -> OsString {
    let mut prefixed = OsString::from(OUTPUT_PREFIX);
    prefixed.push(name);
    prefixed
}

/// Decode an image, detecting the format from its contents rather than its extension.
pub fn load_image(path: &Path) -> Result<RgbImage, ImageError> {
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ImageError::IoError)?
        .decode()?;
    Ok(image.to_rgb8())
}

/// Walks the input directories and writes annotated copies.
pub struct BatchRunner {
    layout: Layout,
    analyzer: Box<dyn FaceAnalyzer>,
    annotator: Annotator,
    video: Box<dyn VideoBackend>,
}

impl BatchRunner {
    pub fn new(
        layout: Layout,
        analyzer: Box<dyn FaceAnalyzer>,
        annotator: Annotator,
        video: Box<dyn VideoBackend>,
    ) -> Self {
        Self {
            layout,
            analyzer,
            annotator,
            video,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Process every image, then every video.
    pub fn run(&mut self) -> Result<BatchSummary> {
        self.layout.ensure()?;

        let mut summary = BatchSummary::default();
        self.process_images(&mut summary)?;
        self.process_videos(&mut summary)?;
        Ok(summary)
    }

    pub fn process_images(&mut self, summary: &mut BatchSummary) -> Result<()> {
        let images = list_inputs(&self.layout.input_images, IMAGE_EXTENSIONS)?;
        info!("Found {} images in {:?}", images.len(), self.layout.input_images);

        for (idx, input) in images.iter().enumerate() {
            let name = input.display_name();
            let image = match load_image(&input.path) {
                Ok(image) => image,
                Err(err) => {
                    warn!("Failed to load image: {} ({})", name, err);
                    summary.skipped += 1;
                    continue;
                }
            };

            let (annotated, data) = self.annotate(image);

            let output_path = self.layout.output_images.join(output_name(&input.name));
            if let Err(err) = annotated.save(&output_path) {
                warn!("Failed to save image {:?}: {}", output_path, err);
                summary.skipped += 1;
                continue;
            }

            info!(
                "Image {}: {} - Analyzed image saved: {}",
                idx + 1,
                data.dominant_emotion.as_deref().unwrap_or("No Emotion Detected"),
                output_path.display()
            );
            summary.images += 1;
        }
        Ok(())
    }

    pub fn process_videos(&mut self, summary: &mut BatchSummary) -> Result<()> {
        let videos = list_inputs(&self.layout.input_videos, VIDEO_EXTENSIONS)?;
        info!("Found {} videos in {:?}", videos.len(), self.layout.input_videos);

        for input in &videos {
            let name = input.display_name();
            let mut reader = match self.video.open_reader(&input.path) {
                Ok(reader) => reader,
                Err(err) => {
                    warn!("Failed to open video: {} ({})", name, err);
                    summary.skipped += 1;
                    continue;
                }
            };

            let output_path = self.layout.output_videos.join(output_name(&input.name));
            let metadata = reader.metadata().clone();
            let mut writer = match self.video.create_writer(&output_path, &metadata) {
                Ok(writer) => writer,
                Err(err) => {
                    warn!("Failed to create output video {:?}: {}", output_path, err);
                    reader.close();
                    summary.skipped += 1;
                    continue;
                }
            };

            info!(
                "Processing video: {} ({}x{} @ {:.2} fps)",
                name, metadata.width, metadata.height, metadata.fps
            );
            let transcoded = self.transcode(&name, reader.as_mut(), writer.as_mut());
            reader.close();
            let finished = writer.close();

            match transcoded.and_then(|frames| finished.map(|_| frames)) {
                Ok(frames) => {
                    info!("Processed {} frames for video: {}", frames, name);
                    info!("Analyzed video saved: {}", output_path.display());
                    summary.videos += 1;
                }
                Err(err) => {
                    warn!("Failed to process video {}: {}", name, err);
                    summary.skipped += 1;
                }
            }
        }
        Ok(())
    }

    fn transcode(
        &mut self,
        name: &str,
        reader: &mut dyn VideoReader,
        writer: &mut dyn VideoWriter,
    ) -> Result<usize, VideoError> {
        let mut frames = 0;
        while let Some(frame) = reader.read_frame()? {
            let (annotated, data) = self.annotate(frame);
            writer.write(&annotated)?;
            frames += 1;

            if frames % PROGRESS_INTERVAL == 0 {
                info!(
                    "Video {}: Processed {} frames - Current Emotion: {}",
                    name,
                    frames,
                    data.dominant_emotion.as_deref().unwrap_or("No Emotion")
                );
            }
        }
        Ok(frames)
    }

    /// Analyze and annotate one frame. Analysis failures leave the frame as is.
    fn annotate(&mut self, frame: RgbImage) -> (RgbImage, EmotionData) {
        match self.analyzer.analyze(&frame) {
            Ok(faces) => self.annotator.process_frame(frame, faces),
            Err(err) => {
                warn!("Face analysis failed, frame left unannotated: {}", err);
                (frame, EmotionData::default())
            }
        }
    }
}
