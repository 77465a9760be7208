//! Deterministic stand-ins for models, speech, fonts and codecs.

use crate::analysis::{AnalysisError, DetectedFace, FaceAnalyzer};
use crate::detector::{DetectorError, FaceBox};
use crate::speech::{SpeechError, Speaker};
use crate::text::TextPainter;
use crate::video::{VideoBackend, VideoError, VideoMetadata, VideoReader, VideoWriter};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub text: String,
    pub origin: (i32, i32),
    pub scale: f32,
    pub color: Rgb<u8>,
}

/// 10 px per character and 20 px tall at scale 1.0; draws a solid block.
#[derive(Clone, Default)]
pub struct FakePainter {
    pub calls: Rc<RefCell<Vec<DrawCall>>>,
}

impl TextPainter for FakePainter {
    fn measure(&self, text: &str, font_scale: f32) -> (u32, u32) {
        let width = (text.chars().count() as f32 * 10.0 * font_scale) as u32;
        let height = (20.0 * font_scale) as u32;
        (width, height)
    }

    fn draw(
        &self,
        frame: &mut RgbImage,
        text: &str,
        origin: (i32, i32),
        font_scale: f32,
        color: Rgb<u8>,
    ) {
        let (w, h) = self.measure(text, font_scale);
        if w > 0 && h > 0 {
            draw_filled_rect_mut(frame, Rect::at(origin.0, origin.1).of_size(w, h), color);
        }
        self.calls.borrow_mut().push(DrawCall {
            text: text.to_string(),
            origin,
            scale: font_scale,
            color,
        });
    }
}

#[derive(Clone, Default)]
pub struct FakeSpeaker {
    pub spoken: Rc<RefCell<Vec<String>>>,
    pub fail: bool,
}

impl Speaker for FakeSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        self.spoken.borrow_mut().push(text.to_string());
        if self.fail {
            return Err(SpeechError::Failed {
                program: "fake".into(),
                status: "exit status: 1".into(),
            });
        }
        Ok(())
    }
}

pub fn face(x: i32, y: i32, w: i32, h: i32, scores: &[(&str, f32)]) -> DetectedFace {
    DetectedFace::new(
        FaceBox::new(x, y, w, h),
        scores.iter().map(|(label, score)| (*label, *score)).collect(),
    )
}

/// Returns the same faces for every frame, or fails when `faces` is `None`.
pub struct FakeAnalyzer {
    pub faces: Option<Vec<DetectedFace>>,
    pub calls: Rc<RefCell<usize>>,
}

impl FakeAnalyzer {
    pub fn returning(faces: Vec<DetectedFace>) -> Self {
        Self {
            faces: Some(faces),
            calls: Rc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            faces: None,
            calls: Rc::default(),
        }
    }
}

impl FaceAnalyzer for FakeAnalyzer {
    fn analyze(&mut self, _frame: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError> {
        *self.calls.borrow_mut() += 1;
        self.faces
            .clone()
            .ok_or_else(|| AnalysisError::Detector(DetectorError::Unknown("broken".into())))
    }
}

/// A video the in-memory backend can "decode".
#[derive(Debug, Clone)]
pub struct MemoryVideo {
    pub metadata: VideoMetadata,
    pub frames: usize,
    /// Decoding fails after this many frames
    pub fail_after: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct WrittenVideo {
    pub metadata: Option<VideoMetadata>,
    pub frames: Vec<RgbImage>,
    pub closed: bool,
}

/// Video backend keyed by file name, recording everything written.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub inputs: HashMap<String, MemoryVideo>,
    pub outputs: Rc<RefCell<HashMap<PathBuf, WrittenVideo>>>,
    pub open_readers: Rc<RefCell<usize>>,
}

impl MemoryBackend {
    pub fn with_video(mut self, name: &str, video: MemoryVideo) -> Self {
        self.inputs.insert(name.to_string(), video);
        self
    }
}

struct MemoryReader {
    video: MemoryVideo,
    next: usize,
    open: Rc<RefCell<usize>>,
    closed: bool,
}

impl VideoReader for MemoryReader {
    fn metadata(&self) -> &VideoMetadata {
        &self.video.metadata
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        if self.closed {
            return Err(VideoError::Closed("reader"));
        }
        if self.video.fail_after == Some(self.next) {
            return Err(VideoError::NoVideoStream);
        }
        if self.next >= self.video.frames {
            return Ok(None);
        }
        self.next += 1;
        let meta = &self.video.metadata;
        Ok(Some(RgbImage::from_pixel(meta.width, meta.height, Rgb([30, 30, 30]))))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            *self.open.borrow_mut() -= 1;
        }
    }
}

struct MemoryWriter {
    path: PathBuf,
    outputs: Rc<RefCell<HashMap<PathBuf, WrittenVideo>>>,
}

impl VideoWriter for MemoryWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        let mut outputs = self.outputs.borrow_mut();
        let video = outputs.entry(self.path.clone()).or_default();
        if video.closed {
            return Err(VideoError::Closed("writer"));
        }
        video.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), VideoError> {
        if let Some(video) = self.outputs.borrow_mut().get_mut(&self.path) {
            video.closed = true;
        }
        Ok(())
    }
}

impl VideoBackend for MemoryBackend {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let video = self
            .inputs
            .get(&name)
            .cloned()
            .ok_or(VideoError::NoVideoStream)?;
        *self.open_readers.borrow_mut() += 1;
        Ok(Box::new(MemoryReader {
            video,
            next: 0,
            open: Rc::clone(&self.open_readers),
            closed: false,
        }))
    }

    fn create_writer(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<Box<dyn VideoWriter>, VideoError> {
        self.outputs.borrow_mut().insert(
            path.to_path_buf(),
            WrittenVideo {
                metadata: Some(metadata.clone()),
                ..WrittenVideo::default()
            },
        );
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            outputs: Rc::clone(&self.outputs),
        }))
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log lines per test thread so parallel tests don't see each other's output.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|lines| {
            lines
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static INSTALL: Once = Once::new();

/// Start capturing log records emitted on the current thread.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&CaptureLogger).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    CAPTURED.with(|lines| lines.borrow_mut().clear());
}

/// Everything logged on this thread since `capture_logs`.
pub fn take_logs() -> Vec<(log::Level, String)> {
    CAPTURED.with(|lines| std::mem::take(&mut *lines.borrow_mut()))
}
