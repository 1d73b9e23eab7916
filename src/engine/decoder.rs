//! FFmpeg video decoding - demux, decode, convert to RGBA
//!
//! One `VideoDecoder` per open file. It is created and used on the stream's
//! playback thread only.

use image::RgbaImage;
use log::{debug, warn};
use playa_ffmpeg as ffmpeg;
use std::sync::Once;

use super::EngineError;

const AV_TIME_BASE: f64 = 1_000_000.0;

static FFMPEG_LOG_INIT: Once = Once::new();

/// Keep FFmpeg's own log output off stderr.
pub fn silence_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
    });
}

/// Decoded picture with its presentation time in seconds.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub image: RgbaImage,
    pub pts: f64,
}

pub struct VideoDecoder {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    /// Seconds per pts tick
    time_base: f64,
    fps: f64,
    duration: f64,
    width: u32,
    height: u32,
    /// EOF was sent to the decoder, only buffered frames remain
    draining: bool,
    /// Fallback clock for frames without pts
    frames_out: u64,
}

fn decode_err(what: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Decode(format!("{}: {}", what, e))
}

impl VideoDecoder {
    pub fn open(path: &str) -> Result<Self, EngineError> {
        silence_ffmpeg_logging();

        let input = ffmpeg::format::input(path).map_err(|e| decode_err("Failed to open video", e))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| EngineError::Decode("No video stream found".to_string()))?;
        let stream_index = stream.index();

        let tb = stream.time_base();
        let time_base = if tb.denominator() != 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            0.0
        };
        let rate = stream.avg_frame_rate();
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| decode_err("Failed to create decoder context", e))?;

        // Multi-threaded frame decoding
        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0;
        }

        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| decode_err("Failed to create video decoder", e))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = Self::scaler_for(decoder.format(), width, height)?;

        let duration = if input.duration() > 0 {
            input.duration() as f64 / AV_TIME_BASE
        } else {
            0.0
        };

        debug!(
            "opened {}: {}x{} @ {:.3} fps, {:.2}s",
            path, width, height, fps, duration
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            fps,
            duration,
            width,
            height,
            draining: false,
            frames_out: 0,
        })
    }

    fn scaler_for(
        format: ffmpeg::format::Pixel,
        width: u32,
        height: u32,
    ) -> Result<ffmpeg::software::scaling::Context, EngineError> {
        ffmpeg::software::scaling::Context::get(
            format,
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| decode_err("Failed to create scaler", e))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Average frame rate, 0.0 if the container does not say.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Container duration in seconds, 0.0 if unknown.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Next frame in decode order, `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError> {
        loop {
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.draining {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // Corrupt packets are skipped, the stream goes on
                        warn!("Failed to send packet: {}", e);
                    }
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| decode_err("Failed to flush decoder", e))?;
                    self.draining = true;
                }
            }
        }
    }

    /// Reposition to the keyframe at or before `secs`. Follow with
    /// `next_frame` until the wanted pts for an exact seek.
    pub fn seek(&mut self, secs: f64) -> Result<(), EngineError> {
        let ts = (secs.max(0.0) * AV_TIME_BASE) as i64;
        self.input
            .seek(ts, ..ts)
            .map_err(|e| decode_err("Seek failed", e))?;
        self.decoder.flush();
        self.draining = false;
        self.frames_out = 0;
        Ok(())
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg::util::frame::video::Video,
    ) -> Result<DecodedFrame, EngineError> {
        if decoded.width() != self.width || decoded.height() != self.height {
            debug!(
                "resolution change {}x{} -> {}x{}",
                self.width,
                self.height,
                decoded.width(),
                decoded.height()
            );
            self.width = decoded.width();
            self.height = decoded.height();
            self.scaler = Self::scaler_for(decoded.format(), self.width, self.height)?;
        }

        let mut rgba_frame = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgba_frame)
            .map_err(|e| decode_err("Failed to scale frame", e))?;

        let rgba_data = rgba_frame.data(0);
        let stride = rgba_frame.stride(0);
        let row_bytes = self.width as usize * 4;
        let mut output = vec![0u8; row_bytes * self.height as usize];
        for y in 0..self.height as usize {
            let src = y * stride;
            let dst = y * row_bytes;
            output[dst..dst + row_bytes].copy_from_slice(&rgba_data[src..src + row_bytes]);
        }
        let image = RgbaImage::from_raw(self.width, self.height, output)
            .ok_or_else(|| EngineError::Decode("Frame buffer size mismatch".to_string()))?;

        let pts = match decoded.timestamp().or(decoded.pts()) {
            Some(ts) if self.time_base > 0.0 => ts as f64 * self.time_base,
            _ if self.fps > 0.0 => self.frames_out as f64 / self.fps,
            _ => 0.0,
        };
        self.frames_out += 1;

        Ok(DecodedFrame { image, pts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let _ = ffmpeg::init();
        let err = VideoDecoder::open("/nonexistent/clip.mp4").err();
        assert!(matches!(err, Some(EngineError::Decode(_))));
    }
}
