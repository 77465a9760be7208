use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Glyph height in pixels at font scale 1.0.
pub const BASE_TEXT_HEIGHT: f32 = 22.0;

/// Locations tried when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum TextError {
    #[error("no usable font found; pass --font with a path to a .ttf file")]
    NoFont,
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    Invalid(PathBuf),
}

/// Measures and renders overlay text onto frames.
///
/// Coordinates are the top-left corner of the text box.
pub trait TextPainter {
    fn measure(&self, text: &str, font_scale: f32) -> (u32, u32);

    fn draw(
        &self,
        frame: &mut RgbImage,
        text: &str,
        origin: (i32, i32),
        font_scale: f32,
        color: Rgb<u8>,
    );
}

/// TrueType text rendering through imageproc.
pub struct GlyphPainter {
    font: FontVec,
}

impl GlyphPainter {
    pub fn from_file(path: &Path) -> Result<Self, TextError> {
        let data = std::fs::read(path).map_err(|source| TextError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontVec::try_from_vec(data).map_err(|_| TextError::Invalid(path.to_path_buf()))?;
        Ok(Self { font })
    }

    /// Load `path` if given, otherwise the first system font that exists.
    pub fn discover(path: Option<&Path>) -> Result<Self, TextError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let found = SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .find(|candidate| candidate.is_file())
            .ok_or(TextError::NoFont)?;
        log::debug!("Using font {:?}", found);
        Self::from_file(found)
    }

    fn px_scale(font_scale: f32) -> PxScale {
        PxScale::from(BASE_TEXT_HEIGHT * font_scale)
    }
}

impl TextPainter for GlyphPainter {
    fn measure(&self, text: &str, font_scale: f32) -> (u32, u32) {
        text_size(Self::px_scale(font_scale), &self.font, text)
    }

    fn draw(
        &self,
        frame: &mut RgbImage,
        text: &str,
        origin: (i32, i32),
        font_scale: f32,
        color: Rgb<u8>,
    ) {
        draw_text_mut(
            frame,
            color,
            origin.0,
            origin.1,
            Self::px_scale(font_scale),
            &self.font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GlyphPainter::discover(Some(&dir.path().join("nope.ttf")));
        assert!(matches!(result, Err(TextError::Read { .. })));
    }

    #[test]
    fn test_garbage_font_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        let result = GlyphPainter::from_file(&path);
        assert!(matches!(result, Err(TextError::Invalid(_))));
    }

    #[test]
    fn test_px_scale_follows_font_scale() {
        let scale = GlyphPainter::px_scale(2.0);
        assert_eq!(scale.y, BASE_TEXT_HEIGHT * 2.0);
    }
}
