//! Video decoding and encoding.
//!
//! The batch runner only sees the [`VideoBackend`] traits; [`FfmpegBackend`]
//! is the production implementation on top of ffmpeg-next.

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg::Error),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("encoder not available: {0}")]
    MissingEncoder(&'static str),
    #[error("frame is {actual:?}, writer expects {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{0} used after close")]
    Closed(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count, 0 when unknown
    pub total_frames: usize,
}

/// Sequential frame source for one video file.
pub trait VideoReader {
    fn metadata(&self) -> &VideoMetadata;

    /// Next decoded frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;

    /// Releases the underlying file. Safe to call more than once.
    fn close(&mut self);
}

/// Frame sink producing one video file.
pub trait VideoWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), VideoError>;

    /// Flushes and finalizes the file. Safe to call more than once.
    fn close(&mut self) -> Result<(), VideoError>;
}

/// Opens readers and writers for the batch runner.
pub trait VideoBackend {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoError>;

    fn create_writer(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<Box<dyn VideoWriter>, VideoError>;
}

/// ffmpeg-next backed decoding, with MPEG-4 Part 2 output.
#[derive(Debug, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Result<Self, VideoError> {
        ffmpeg::init()?;
        Ok(Self)
    }
}

impl VideoBackend for FfmpegBackend {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoError> {
        Ok(Box::new(FfmpegReader::open(path)?))
    }

    fn create_writer(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<Box<dyn VideoWriter>, VideoError> {
        Ok(Box::new(FfmpegWriter::create(path, metadata)?))
    }
}

struct Decoding {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    flushing: bool,
}

pub struct FfmpegReader {
    state: Option<Decoding>,
    metadata: VideoMetadata,
}

impl FfmpegReader {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let ictx = ffmpeg::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(VideoError::NoVideoStream)?;
        let stream_index = stream.index();
        let rate = stream.rate();
        let total_frames = stream.frames().max(0) as usize;

        let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let fps = if rate.denominator() != 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        };

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
        };

        Ok(Self {
            state: Some(Decoding {
                ictx,
                decoder,
                scaler,
                stream_index,
                flushing: false,
            }),
            metadata,
        })
    }
}

impl Decoding {
    fn receive(&mut self, width: u32, height: u32) -> Result<Option<RgbImage>, VideoError> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb = ffmpeg::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;
        Ok(Some(packed_rgb(&rgb, width, height)))
    }
}

impl VideoReader for FfmpegReader {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let (width, height) = (self.metadata.width, self.metadata.height);
        let state = self.state.as_mut().ok_or(VideoError::Closed("reader"))?;

        if let Some(frame) = state.receive(width, height)? {
            return Ok(Some(frame));
        }
        if state.flushing {
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = state.ictx.packets().next() else {
                if let Err(err) = state.decoder.send_eof() {
                    log::debug!("Decoder refused end of stream: {}", err);
                }
                state.flushing = true;
                return state.receive(width, height);
            };

            if stream.index() != state.stream_index {
                continue;
            }
            if let Err(err) = state.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            if let Some(frame) = state.receive(width, height)? {
                return Ok(Some(frame));
            }
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// Copy an RGB24 ffmpeg frame into a tightly packed image, dropping row padding.
fn packed_rgb(frame: &ffmpeg::util::frame::video::Video, width: u32, height: u32) -> RgbImage {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    RgbImage::from_raw(width, height, pixels).unwrap_or_else(|| RgbImage::new(width, height))
}

struct Encoding {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    time_base: ffmpeg::Rational,
}

pub struct FfmpegWriter {
    state: Option<Encoding>,
    width: u32,
    height: u32,
    frame_count: i64,
}

impl FfmpegWriter {
    pub fn create(path: &Path, metadata: &VideoMetadata) -> Result<Self, VideoError> {
        let mut octx = ffmpeg::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or(VideoError::MissingEncoder("mpeg4"))?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let frame_rate = if metadata.fps > 0.0 {
            ffmpeg::Rational::from(metadata.fps)
        } else {
            ffmpeg::Rational(30, 1)
        };
        let time_base = frame_rate.invert();

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(frame_rate));
        if global_header {
            encoder_ctx.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        ost.set_avg_frame_rate(frame_rate);
        ost.set_rate(frame_rate);

        octx.write_header()?;

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            state: Some(Encoding {
                octx,
                encoder,
                scaler,
                time_base,
            }),
            width: metadata.width,
            height: metadata.height,
            frame_count: 0,
        })
    }
}

impl Encoding {
    fn drain(&mut self) -> Result<(), VideoError> {
        let ost_time_base = self
            .octx
            .stream(0)
            .map(|stream| stream.time_base())
            .unwrap_or(self.time_base);

        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.time_base, ost_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(VideoError::FrameSize {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }
        let state = self.state.as_mut().ok_or(VideoError::Closed("writer"))?;

        let mut rgb = ffmpeg::util::frame::video::Video::new(
            ffmpeg::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb.stride(0);
        let row_len = self.width as usize * 3;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.as_raw().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut yuv = ffmpeg::util::frame::video::Video::empty();
        state.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.frame_count));

        state.encoder.send_frame(&yuv)?;
        state.drain()?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), VideoError> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.encoder.send_eof()?;
        state.drain()?;
        state.octx.write_trailer()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_roundtrip_preserves_count_size_and_rate() {
        let backend = FfmpegBackend::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let metadata = VideoMetadata {
            width: 320,
            height: 240,
            fps: 30.0,
            total_frames: 0,
        };

        let mut writer = backend.create_writer(&path, &metadata).unwrap();
        for i in 0..12u8 {
            writer
                .write(&RgbImage::from_pixel(320, 240, Rgb([i * 20, 100, 200])))
                .unwrap();
        }
        writer.close().unwrap();
        // second close is a no-op
        writer.close().unwrap();

        let mut reader = backend.open_reader(&path).unwrap();
        assert_eq!(reader.metadata().width, 320);
        assert_eq!(reader.metadata().height, 240);
        assert!((reader.metadata().fps - 30.0).abs() < 0.01);

        let mut frames = 0;
        while let Some(frame) = reader.read_frame().unwrap() {
            assert_eq!(frame.dimensions(), (320, 240));
            frames += 1;
        }
        assert_eq!(frames, 12);
        reader.close();
        assert!(matches!(reader.read_frame(), Err(VideoError::Closed(_))));
    }

    #[test]
    fn test_writer_rejects_wrong_frame_size() {
        let backend = FfmpegBackend::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let metadata = VideoMetadata {
            width: 64,
            height: 48,
            fps: 25.0,
            total_frames: 0,
        };
        let mut writer = backend
            .create_writer(&dir.path().join("out.avi"), &metadata)
            .unwrap();
        let result = writer.write(&RgbImage::new(32, 32));
        assert!(matches!(result, Err(VideoError::FrameSize { .. })));
        writer.close().unwrap();
    }

    #[test]
    fn test_open_missing_file_fails() {
        let backend = FfmpegBackend::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(backend.open_reader(&dir.path().join("missing.mp4")).is_err());
    }

    #[test]
    fn test_open_non_video_fails() {
        let backend = FfmpegBackend::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.mp4");
        std::fs::write(&path, b"not a video at all").unwrap();
        assert!(backend.open_reader(&path).is_err());
    }
}
