//! [`MediaEngine`] implementation on top of the FFmpeg libraries
//!
//! Both encode operations share one demux loop: packets from the source are
//! decoded, pushed through a filter graph that slices (and for video crops
//! and converts) the frames, then encoded and interleaved into the output.
//! The `Time` bar counts frames leaving the filter graph.
//!
//! Clip times are relative to the first frame. Stream timestamps are not:
//! they carry the container's start time, so every trim bound, seek target
//! and demux cutoff is shifted by it.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{ExportError, FfmpegError, Result};
use crate::ffmpeg_utils::context::{probe_source, InputContext};
use crate::ffmpeg_utils::ts_to_secs;
use crate::transcode::decoder::{AudioDecoder, VideoDecoder};
use crate::transcode::encoder::{
    audio_codec_for_extension, even, AudioEncoder, AudioEncoderConfig, VideoEncoder,
    VideoEncoderConfig,
};
use crate::transcode::filter::{audio_filter_spec, video_filter_spec, AudioFilter, Pull, VideoFilter};
use crate::transcode::muxer::OutputFile;
use crate::types::{PixelRect, SourceMedia};

use super::{AudioSettings, Bar, BarAttribute, Clip, MediaEngine, ProgressSink, VideoCodecs};

/// Keep demuxing this long past the slice end so reordered frames still
/// reach the trim filter.
const READ_MARGIN_SECS: f64 = 1.0;

/// The FFmpeg-backed media engine
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    audio: AudioSettings,
}

impl FfmpegEngine {
    pub fn new(audio: AudioSettings) -> Self {
        Self { audio }
    }
}

impl MediaEngine for FfmpegEngine {
    fn open(&self, path: &Path) -> Result<SourceMedia> {
        probe_source(path)
    }

    fn encode_audio(&self, clip: &Clip, output: &Path, progress: &mut dyn ProgressSink) -> Result<()> {
        let mut input = InputContext::open(&clip.source().path)?;
        let origin = input.start_time();
        let audio_index = input
            .best_audio_stream()
            .ok_or(ExportError::MissingAudioTrack)?;

        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let codec_id = audio_codec_for_extension(ext).ok_or_else(|| {
            ExportError::Encode(format!("no audio codec known for .{} files", ext))
        })?;
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| FfmpegError::EncoderNotFound(format!("{:?}", codec_id)))?;

        let mut out = OutputFile::create(output)?;
        let mut audio = AudioLane::open(
            &input,
            audio_index,
            clip,
            origin,
            codec,
            &AudioEncoderConfig {
                sample_rate: self.audio.sample_rate,
                channels: 2,
                bitrate: self.audio.bitrate,
                global_header: out.needs_global_header(),
            },
            &mut out,
        )?;
        audio.counts_progress = true;
        out.write_header()?;

        let total = audio.expected_frames(clip.duration_secs());
        let mut bars = Bars::new(progress, total);

        tracing::info!(
            source = ?clip.source().path,
            output = ?output,
            codec = codec.name(),
            start = clip.start_secs(),
            end = clip.end_secs(),
            origin,
            "encoding audio"
        );

        seek_to_clip(&mut input, clip, origin)?;
        demux(&mut input, None, Some(&mut audio), origin + clip.end_secs(), &mut out, &mut bars)?;
        out.finish()
    }

    fn encode_video(
        &self,
        clip: &Clip,
        output: &Path,
        codecs: &VideoCodecs,
        progress: &mut dyn ProgressSink,
    ) -> Result<(u32, u32)> {
        let mut input = InputContext::open(&clip.source().path)?;
        let origin = input.start_time();
        let video_index = input.best_video_stream().ok_or(ExportError::NoVideoStream)?;
        let audio_index = input.best_audio_stream();

        let mut out = OutputFile::create(output)?;
        let global_header = out.needs_global_header();

        let mut video = VideoLane::open(&input, video_index, clip, origin, codecs, global_header, &mut out)?;
        let mut audio = match audio_index {
            Some(index) => {
                let codec = crate::transcode::encoder::find_encoder(&codecs.audio, ffmpeg::codec::Id::AAC)?;
                Some(AudioLane::open(
                    &input,
                    index,
                    clip,
                    origin,
                    codec,
                    &AudioEncoderConfig {
                        sample_rate: 48_000,
                        channels: 2,
                        bitrate: codecs.audio_bitrate,
                        global_header,
                    },
                    &mut out,
                )?)
            }
            None => None,
        };
        out.write_header()?;

        let mut bars = Bars::new(progress, clip.expected_frames());

        tracing::info!(
            source = ?clip.source().path,
            output = ?output,
            start = clip.start_secs(),
            end = clip.end_secs(),
            crop = ?clip.crop_rect(),
            size = ?video.size,
            with_audio = audio.is_some(),
            origin,
            "encoding video"
        );

        seek_to_clip(&mut input, clip, origin)?;
        demux(
            &mut input,
            Some(&mut video),
            audio.as_mut(),
            origin + clip.end_secs(),
            &mut out,
            &mut bars,
        )?;
        out.finish()?;
        Ok(video.size)
    }
}

/// Position the demuxer at the clip start; a clip from zero reads from the top.
fn seek_to_clip(input: &mut InputContext, clip: &Clip, origin: f64) -> Result<()> {
    if clip.start_secs() > 0.0 {
        input.seek_to(origin + clip.start_secs())?;
    }
    Ok(())
}

/// Progress bookkeeping around the caller's sink
struct Bars<'a> {
    sink: &'a mut dyn ProgressSink,
    frames: u64,
    packets: u64,
}

impl<'a> Bars<'a> {
    fn new(sink: &'a mut dyn ProgressSink, total: u64) -> Self {
        sink.bars_callback(Bar::Time, BarAttribute::Total, total, None);
        sink.bars_callback(Bar::Time, BarAttribute::Index, 0, None);
        Self {
            sink,
            frames: 0,
            packets: 0,
        }
    }

    fn frame(&mut self) {
        let old = self.frames;
        self.frames += 1;
        self.sink
            .bars_callback(Bar::Time, BarAttribute::Index, self.frames, Some(old));
    }

    fn packet(&mut self) {
        let old = self.packets;
        self.packets += 1;
        self.sink
            .bars_callback(Bar::Packets, BarAttribute::Index, self.packets, Some(old));
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.sink.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }
}

/// Decoder, filter graph and encoder for the video stream
struct VideoLane {
    decoder: VideoDecoder,
    filter: VideoFilter,
    encoder: VideoEncoder,
    handle: usize,
    /// Frame size handed to the encoder
    size: (u32, u32),
    reading_done: bool,
}

impl VideoLane {
    fn open(
        input: &InputContext,
        index: usize,
        clip: &Clip,
        origin: f64,
        codecs: &VideoCodecs,
        global_header: bool,
        out: &mut OutputFile,
    ) -> Result<Self> {
        let stream = input
            .inner()
            .stream(index)
            .ok_or(ExportError::NoVideoStream)?;
        let decoder = VideoDecoder::open(&stream)?;

        let crop = clip.crop_rect().map(even_crop);
        let (width, height) = match crop {
            Some(r) => (r.width(), r.height()),
            None => (even(decoder.width()), even(decoder.height())),
        };
        let crop = crop.or_else(|| {
            // Odd source dimensions still need an even-sized output.
            (width != decoder.width() || height != decoder.height()).then_some(PixelRect {
                x1: 0,
                y1: 0,
                x2: width,
                y2: height,
            })
        });
        if width == 0 || height == 0 {
            return Err(ExportError::InvalidCrop(format!(
                "{:?} leaves no pixels to encode",
                clip.crop_rect()
            )));
        }

        let mut frame_rate = stream.avg_frame_rate();
        if frame_rate.numerator() <= 0 || frame_rate.denominator() <= 0 {
            frame_rate = ffmpeg::Rational::new(25, 1);
        }

        let spec = video_filter_spec(origin + clip.start_secs(), origin + clip.end_secs(), crop);
        let filter = VideoFilter::new(&decoder, &spec)?;
        let encoder = VideoEncoder::open(
            &codecs.video,
            &VideoEncoderConfig {
                width,
                height,
                time_base: decoder.time_base(),
                frame_rate,
                crf: codecs.crf,
                preset: codecs.preset.clone(),
                global_header,
            },
        )?;
        let handle = out.add_stream(encoder.codec(), encoder.codec_parameters(), encoder.time_base())?;

        Ok(Self {
            decoder,
            filter,
            encoder,
            handle,
            size: (width, height),
            reading_done: false,
        })
    }

    fn pump(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        while let Some(frame) = self.decoder.receive_frame()? {
            self.filter.push(&frame)?;
            self.drain_filter(out, bars)?;
        }
        Ok(())
    }

    fn drain_filter(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        while let Pull::Frame(mut frame) = self.filter.pull()? {
            frame.set_kind(ffmpeg::picture::Type::None);
            self.encoder.send_frame(&frame)?;
            bars.frame();
            self.drain_encoder(out)?;
        }
        Ok(())
    }

    fn drain_encoder(&mut self, out: &mut OutputFile) -> Result<()> {
        while let Some(packet) = self.encoder.receive_packet()? {
            out.write(self.handle, packet)?;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        self.decoder.send_eof()?;
        self.pump(out, bars)?;
        self.filter.flush()?;
        self.drain_filter(out, bars)?;
        self.encoder.send_eof()?;
        self.drain_encoder(out)
    }
}

/// Decoder, filter graph and encoder for the audio stream
struct AudioLane {
    decoder: AudioDecoder,
    filter: AudioFilter,
    encoder: AudioEncoder,
    handle: usize,
    counts_progress: bool,
    reading_done: bool,
}

impl AudioLane {
    fn open(
        input: &InputContext,
        index: usize,
        clip: &Clip,
        origin: f64,
        codec: ffmpeg::Codec,
        config: &AudioEncoderConfig,
        out: &mut OutputFile,
    ) -> Result<Self> {
        let stream = input
            .inner()
            .stream(index)
            .ok_or(ExportError::MissingAudioTrack)?;
        let decoder = AudioDecoder::open(&stream)?;

        let config = AudioEncoderConfig {
            channels: decoder.channels().clamp(1, config.channels),
            ..config.clone()
        };
        let encoder = AudioEncoder::open_codec(codec, &config)?;

        let spec = audio_filter_spec(
            origin + clip.start_secs(),
            origin + clip.end_secs(),
            encoder.format().name(),
            encoder.sample_rate(),
            encoder.channel_layout_name(),
        );
        let filter = AudioFilter::new(&decoder, &spec, encoder.frame_size())?;
        let handle = out.add_stream(encoder.codec(), encoder.codec_parameters(), encoder.time_base())?;

        Ok(Self {
            decoder,
            filter,
            encoder,
            handle,
            counts_progress: false,
            reading_done: false,
        })
    }

    /// Encoder frames a slice of `duration_secs` produces.
    fn expected_frames(&self, duration_secs: f64) -> u64 {
        let frame_size = match self.encoder.frame_size() {
            0 => 1024,
            n => n,
        };
        let samples = duration_secs * self.encoder.sample_rate() as f64;
        ((samples / frame_size as f64).ceil() as u64).max(1)
    }

    fn pump(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        while let Some(frame) = self.decoder.receive_frame()? {
            self.filter.push(&frame)?;
            self.drain_filter(out, bars)?;
        }
        Ok(())
    }

    fn drain_filter(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        while let Pull::Frame(mut frame) = self.filter.pull()? {
            self.encoder.send_frame(&mut frame)?;
            if self.counts_progress {
                bars.frame();
            }
            self.drain_encoder(out)?;
        }
        Ok(())
    }

    fn drain_encoder(&mut self, out: &mut OutputFile) -> Result<()> {
        while let Some(packet) = self.encoder.receive_packet()? {
            out.write(self.handle, packet)?;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut OutputFile, bars: &mut Bars<'_>) -> Result<()> {
        self.decoder.send_eof()?;
        self.pump(out, bars)?;
        self.filter.flush()?;
        self.drain_filter(out, bars)?;
        self.encoder.send_eof()?;
        self.drain_encoder(out)
    }
}

/// Read packets until every active lane has passed `end_secs` on the stream
/// time axis, then flush.
fn demux(
    input: &mut InputContext,
    mut video: Option<&mut VideoLane>,
    mut audio: Option<&mut AudioLane>,
    end_secs: f64,
    out: &mut OutputFile,
    bars: &mut Bars<'_>,
) -> Result<()> {
    let cutoff = end_secs + READ_MARGIN_SECS;

    for (stream, packet) in input.inner_mut().packets() {
        bars.check_cancelled()?;
        bars.packet();

        let index = stream.index();
        let past_cutoff = packet
            .pts()
            .or(packet.dts())
            .map(|ts| ts_to_secs(ts, stream.time_base()) > cutoff)
            .unwrap_or(false);

        if let Some(v) = video.as_deref_mut() {
            if v.decoder.stream_index() == index && !v.reading_done {
                if past_cutoff {
                    v.reading_done = true;
                } else {
                    v.decoder.send_packet(&packet)?;
                    v.pump(out, bars)?;
                }
            }
        }
        if let Some(a) = audio.as_deref_mut() {
            if a.decoder.stream_index() == index && !a.reading_done {
                if past_cutoff {
                    a.reading_done = true;
                } else {
                    a.decoder.send_packet(&packet)?;
                    a.pump(out, bars)?;
                }
            }
        }

        let video_done = video.as_ref().map_or(true, |v| v.reading_done);
        let audio_done = audio.as_ref().map_or(true, |a| a.reading_done);
        if video_done && audio_done {
            break;
        }
    }

    bars.check_cancelled()?;
    if let Some(v) = video.as_deref_mut() {
        v.finish(out, bars)?;
    }
    if let Some(a) = audio.as_deref_mut() {
        a.finish(out, bars)?;
    }
    tracing::debug!(frames = bars.frames, packets = bars.packets, "demux finished");
    Ok(())
}

/// Shrink a crop to even width and height, keeping its origin.
fn even_crop(rect: PixelRect) -> PixelRect {
    PixelRect {
        x2: rect.x1 + even(rect.width()),
        y2: rect.y1 + even(rect.height()),
        ..rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_crop_keeps_even_rect() {
        let rect = PixelRect { x1: 480, y1: 270, x2: 1440, y2: 810 };
        assert_eq!(even_crop(rect), rect);
    }

    #[test]
    fn test_even_crop_trims_odd_edges() {
        let rect = PixelRect { x1: 3, y1: 5, x2: 104, y2: 56 };
        let even = even_crop(rect);
        assert_eq!((even.width(), even.height()), (100, 50));
        assert_eq!((even.x1, even.y1), (3, 5));
    }
}
