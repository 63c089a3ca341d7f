//! Filter graphs that slice, crop and convert decoded frames
//!
//! Slicing is done inside the graph with `trim`/`atrim` so that frames are
//! cut on their own timestamps rather than on packet boundaries; the
//! following `setpts`/`asetpts` rebases the slice to start at zero.

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result};
use crate::types::PixelRect;

use super::decoder::{AudioDecoder, VideoDecoder};

fn filter_err(what: &str, e: ffmpeg::Error) -> FfmpegError {
    FfmpegError::Filter(format!("{}: {}", what, e))
}

/// Outcome of pulling from a filter sink
pub enum Pull<T> {
    Frame(T),
    /// The graph needs more input
    Again,
    /// The graph has been flushed and fully drained
    Done,
}

fn pull_result<T>(result: std::result::Result<(), ffmpeg::Error>, frame: T) -> Result<Pull<T>> {
    match result {
        Ok(()) => Ok(Pull::Frame(frame)),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(Pull::Again),
        Err(ffmpeg::Error::Eof) => Ok(Pull::Done),
        Err(e) => Err(filter_err("buffersink", e).into()),
    }
}

/// Video chain spec for a slice and optional crop.
///
/// The bounds are compared against frame timestamps, so they must include
/// the source's start time.
pub fn video_filter_spec(start_secs: f64, end_secs: f64, crop: Option<PixelRect>) -> String {
    let mut spec = format!(
        "trim=start={:.6}:end={:.6},setpts=PTS-STARTPTS",
        start_secs, end_secs
    );
    if let Some(r) = crop {
        spec.push_str(&format!(",crop={}:{}:{}:{}", r.width(), r.height(), r.x1, r.y1));
    }
    spec.push_str(",format=yuv420p");
    spec
}

/// Audio chain spec for a slice converted to the encoder's input format;
/// bounds as for [`video_filter_spec`].
pub fn audio_filter_spec(
    start_secs: f64,
    end_secs: f64,
    sample_format: &str,
    sample_rate: u32,
    channel_layout: &str,
) -> String {
    format!(
        "atrim=start={:.6}:end={:.6},asetpts=PTS-STARTPTS,aformat=sample_fmts={}:sample_rates={}:channel_layouts={}",
        start_secs, end_secs, sample_format, sample_rate, channel_layout
    )
}

/// A `buffer -> chain -> buffersink` graph for video frames
pub struct VideoFilter {
    graph: ffmpeg::filter::Graph,
}

impl VideoFilter {
    /// Build a graph fed by `decoder`'s frames.
    pub fn new(decoder: &VideoDecoder, spec: &str) -> Result<Self> {
        let tb = decoder.time_base();
        let sar = decoder.aspect_ratio();
        let pix_fmt: ffmpeg::ffi::AVPixelFormat = decoder.format().into();
        let args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
            decoder.width(),
            decoder.height(),
            pix_fmt as i32,
            tb.numerator(),
            tb.denominator(),
            sar.numerator(),
            sar.denominator()
        );

        let mut graph = ffmpeg::filter::Graph::new();
        let buffer = ffmpeg::filter::find("buffer")
            .ok_or_else(|| FfmpegError::Filter("buffer filter not available".into()))?;
        let sink = ffmpeg::filter::find("buffersink")
            .ok_or_else(|| FfmpegError::Filter("buffersink filter not available".into()))?;
        graph
            .add(&buffer, "in", &args)
            .map_err(|e| filter_err("add buffer", e))?;
        graph
            .add(&sink, "out", "")
            .map_err(|e| filter_err("add buffersink", e))?;
        graph
            .output("in", 0)
            .and_then(|p| p.input("out", 0))
            .and_then(|p| p.parse(spec))
            .map_err(|e| filter_err(spec, e))?;
        graph.validate().map_err(|e| filter_err("validate", e))?;

        tracing::debug!(%args, %spec, "video filter graph ready");
        Ok(Self { graph })
    }

    /// Build a graph with no input, driven by a source filter such as `testsrc`.
    pub fn generator(spec: &str) -> Result<Self> {
        let mut graph = ffmpeg::filter::Graph::new();
        let sink = ffmpeg::filter::find("buffersink")
            .ok_or_else(|| FfmpegError::Filter("buffersink filter not available".into()))?;
        graph
            .add(&sink, "out", "")
            .map_err(|e| filter_err("add buffersink", e))?;
        graph
            .input("out", 0)
            .and_then(|p| p.parse(spec))
            .map_err(|e| filter_err(spec, e))?;
        graph.validate().map_err(|e| filter_err("validate", e))?;
        Ok(Self { graph })
    }

    pub fn push(&mut self, frame: &ffmpeg::util::frame::Video) -> Result<()> {
        let mut src = self
            .graph
            .get("in")
            .ok_or_else(|| FfmpegError::Filter("graph has no input".into()))?;
        src.source()
            .add(frame)
            .map_err(|e| filter_err("buffer add", e).into())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(mut src) = self.graph.get("in") {
            src.source().flush().map_err(|e| filter_err("buffer flush", e))?;
        }
        Ok(())
    }

    pub fn pull(&mut self) -> Result<Pull<ffmpeg::util::frame::Video>> {
        let mut frame = ffmpeg::util::frame::Video::empty();
        let mut out = self
            .graph
            .get("out")
            .ok_or_else(|| FfmpegError::Filter("graph has no output".into()))?;
        let result = out.sink().frame(&mut frame);
        pull_result(result, frame)
    }
}

/// An `abuffer -> chain -> abuffersink` graph for audio frames
pub struct AudioFilter {
    graph: ffmpeg::filter::Graph,
}

impl AudioFilter {
    /// Build a graph fed by `decoder`'s frames.
    ///
    /// `frame_size` > 0 makes the sink emit frames of exactly that many
    /// samples, as fixed-frame-size encoders (AAC, MP3) require.
    pub fn new(decoder: &AudioDecoder, spec: &str, frame_size: u32) -> Result<Self> {
        let tb = decoder.time_base();
        let args = format!(
            "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout=0x{:x}",
            tb.numerator(),
            tb.denominator(),
            decoder.sample_rate(),
            decoder.format().name(),
            decoder.channel_layout_bits()
        );

        let mut graph = ffmpeg::filter::Graph::new();
        let abuffer = ffmpeg::filter::find("abuffer")
            .ok_or_else(|| FfmpegError::Filter("abuffer filter not available".into()))?;
        graph
            .add(&abuffer, "in", &args)
            .map_err(|e| filter_err("add abuffer", e))?;
        Self::finish(graph, Some("in"), spec, frame_size, &args)
    }

    /// Build a graph with no input, driven by a source filter such as `sine`.
    pub fn generator(spec: &str, frame_size: u32) -> Result<Self> {
        Self::finish(ffmpeg::filter::Graph::new(), None, spec, frame_size, "")
    }

    fn finish(
        mut graph: ffmpeg::filter::Graph,
        input: Option<&str>,
        spec: &str,
        frame_size: u32,
        args: &str,
    ) -> Result<Self> {
        let abuffersink = ffmpeg::filter::find("abuffersink")
            .ok_or_else(|| FfmpegError::Filter("abuffersink filter not available".into()))?;
        graph
            .add(&abuffersink, "out", "")
            .map_err(|e| filter_err("add abuffersink", e))?;

        let parsed = match input {
            Some(name) => graph
                .output(name, 0)
                .and_then(|p| p.input("out", 0))
                .and_then(|p| p.parse(spec)),
            None => graph.input("out", 0).and_then(|p| p.parse(spec)),
        };
        parsed.map_err(|e| filter_err(spec, e))?;
        graph.validate().map_err(|e| filter_err("validate", e))?;

        if frame_size > 0 {
            if let Some(mut out) = graph.get("out") {
                out.sink().set_frame_size(frame_size);
            }
        }

        tracing::debug!(%args, %spec, frame_size, "audio filter graph ready");
        Ok(Self { graph })
    }

    pub fn push(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        let mut src = self
            .graph
            .get("in")
            .ok_or_else(|| FfmpegError::Filter("graph has no input".into()))?;
        src.source()
            .add(frame)
            .map_err(|e| filter_err("abuffer add", e).into())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(mut src) = self.graph.get("in") {
            src.source().flush().map_err(|e| filter_err("abuffer flush", e))?;
        }
        Ok(())
    }

    pub fn pull(&mut self) -> Result<Pull<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        let mut out = self
            .graph
            .get("out")
            .ok_or_else(|| FfmpegError::Filter("graph has no output".into()))?;
        let result = out.sink().frame(&mut frame);
        pull_result(result, frame)
    }
}
