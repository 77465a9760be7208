//! Per-frame annotation: face boxes, emotion labels and spoken compliments.
//!
//! Overlay text is sized relative to a 640 px wide reference frame and
//! nudged back inside the frame whenever it would spill over an edge.

use crate::analysis::DetectedFace;
use crate::cooldown::Cooldown;
use crate::detector::FaceBox;
use crate::emotion::{color_for, compliments_for, title_case, DEFAULT_COLOR, DEFAULT_COMPLIMENTS};
use crate::speech::Speaker;
use crate::text::TextPainter;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Instant;

pub const REFERENCE_WIDTH: f32 = 640.0;
pub const MIN_FONT_SCALE: f32 = 0.5;
pub const MAX_FONT_SCALE: f32 = 2.0;
pub const LABEL_FONT_SCALE: f32 = 0.6;
/// Gap kept between relocated text and the frame edge.
pub const EDGE_MARGIN: i32 = 10;
/// Vertical gap between a face box and its label above it.
pub const LABEL_GAP: i32 = 10;
/// Distance from the bottom of a face box to its compliment.
pub const COMPLIMENT_OFFSET: i32 = 30;
pub const COMPLIMENT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;

/// What was found in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionData {
    pub faces: Vec<DetectedFace>,
    /// Dominant label of the last face processed
    pub dominant_emotion: Option<String>,
}

/// Font scale for a frame `width` pixels wide, clamped to [0.5, 2.0].
pub fn font_scale(width: u32) -> f32 {
    (width as f32 / REFERENCE_WIDTH).clamp(MIN_FONT_SCALE, MAX_FONT_SCALE)
}

/// Move a text box at `origin` so it stays inside the frame.
///
/// Right or bottom overflow pulls the text back to `EDGE_MARGIN` px from
/// that edge; negative coordinates are then clamped to zero.
pub fn place_text(origin: (i32, i32), frame_size: (u32, u32), text_size: (u32, u32)) -> (i32, i32) {
    let (mut x, mut y) = origin;
    let frame_w = frame_size.0 as i32;
    let frame_h = frame_size.1 as i32;
    let text_w = text_size.0 as i32;
    let text_h = text_size.1 as i32;

    if x + text_w > frame_w {
        x = frame_w - text_w - EDGE_MARGIN;
    }
    if y + text_h > frame_h {
        y = frame_h - text_h - EDGE_MARGIN;
    }
    (x.max(0), y.max(0))
}

pub struct Annotator {
    painter: Box<dyn TextPainter>,
    speaker: Box<dyn Speaker>,
    cooldown: Cooldown,
    rng: StdRng,
}

impl Annotator {
    pub fn new(painter: Box<dyn TextPainter>, speaker: Box<dyn Speaker>, cooldown: Cooldown) -> Self {
        Self {
            painter,
            speaker,
            cooldown,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the compliment picker's seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn process_frame(&mut self, frame: RgbImage, faces: Vec<DetectedFace>) -> (RgbImage, EmotionData) {
        self.process_frame_at(frame, faces, Instant::now())
    }

    /// Annotate `frame` with `faces`, treating `now` as the current time.
    pub fn process_frame_at(
        &mut self,
        mut frame: RgbImage,
        faces: Vec<DetectedFace>,
        now: Instant,
    ) -> (RgbImage, EmotionData) {
        let mut dominant_emotion = None;

        for face in &faces {
            let Some((label, score)) = face.emotions.dominant() else {
                draw_box(&mut frame, &face.bbox, DEFAULT_COLOR);
                continue;
            };

            let confidence = score * 100.0;
            let color = color_for(label);
            draw_box(&mut frame, &face.bbox, color);

            let caption = format!("{} ({:.1}%)", title_case(label), confidence);
            let caption_size = self.painter.measure(&caption, LABEL_FONT_SCALE);
            let caption_origin = (face.bbox.x, face.bbox.y - LABEL_GAP - caption_size.1 as i32);
            let caption_origin = place_text(caption_origin, frame.dimensions(), caption_size);
            self.painter
                .draw(&mut frame, &caption, caption_origin, LABEL_FONT_SCALE, color);

            dominant_emotion = Some(label.to_string());

            if self.cooldown.try_acquire(label, now) {
                let compliment = self.give_compliment(label);
                info!(
                    "Detected emotion: {} ({:.1}%) - compliment: \"{}\"",
                    title_case(label),
                    confidence,
                    compliment
                );
                self.overlay_compliment(&mut frame, &face.bbox, compliment);
            }
        }

        (
            frame,
            EmotionData {
                faces,
                dominant_emotion,
            },
        )
    }

    /// Pick a phrase for `label` and say it out loud.
    fn give_compliment(&mut self, label: &str) -> &'static str {
        let compliment = compliments_for(label)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(DEFAULT_COMPLIMENTS[0]);

        if let Err(err) = self.speaker.speak(compliment) {
            warn!("Text-to-speech failed: {}", err);
        }
        compliment
    }

    fn overlay_compliment(&self, frame: &mut RgbImage, bbox: &FaceBox, text: &str) {
        let scale = font_scale(frame.width());
        let size = self.painter.measure(text, scale);
        let origin = (bbox.x, bbox.bottom() + COMPLIMENT_OFFSET);
        let origin = place_text(origin, frame.dimensions(), size);
        self.painter.draw(frame, text, origin, scale, COMPLIMENT_COLOR);
    }
}

fn draw_box(frame: &mut RgbImage, bbox: &FaceBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width - 2 * inset;
        let height = bbox.height - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(frame, rect, color);
    }
}
