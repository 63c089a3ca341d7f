//! Encoders for the export pipeline
//!
//! `VideoEncoder` wraps an H.264-family encoder fed with `yuv420p` frames;
//! `AudioEncoder` wraps any audio encoder (AAC for MP4 exports, MP3 for audio
//! extraction) fed with frames already converted by the filter graph.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type as SampleType};

use crate::error::{FfmpegError, Result};

/// Sample format preferred when the encoder accepts it
pub const PREFERRED_SAMPLE_FMT: Sample = Sample::F32(SampleType::Planar);

/// Look up an encoder by name, falling back to the default encoder for `id`.
pub fn find_encoder(name: &str, fallback: codec::Id) -> Result<ffmpeg::Codec> {
    if let Some(codec) = ffmpeg::encoder::find_by_name(name) {
        return Ok(codec);
    }
    tracing::warn!(
        requested = name,
        fallback = ?fallback,
        "encoder not available, using default encoder for codec"
    );
    ffmpeg::encoder::find(fallback).ok_or_else(|| {
        FfmpegError::EncoderNotFound(format!(
            "neither {} nor a {:?} encoder is available in this FFmpeg build",
            name, fallback
        ))
        .into()
    })
}

/// Drain one packet from an encoder, `None` when it needs more input.
fn receive(
    result: std::result::Result<(), ffmpeg::Error>,
    packet: ffmpeg::codec::packet::Packet,
    what: &str,
) -> Result<Option<ffmpeg::codec::packet::Packet>> {
    match result {
        Ok(()) => Ok(Some(packet)),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
        Err(ffmpeg::Error::Eof) => Ok(None),
        Err(e) => Err(FfmpegError::EncodeFrame(format!("{} receive_packet: {}", what, e)).into()),
    }
}

/// Video encoder configuration
#[derive(Debug, Clone)]
pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub time_base: ffmpeg::Rational,
    pub frame_rate: ffmpeg::Rational,
    pub crf: u32,
    pub preset: String,
    pub global_header: bool,
}

/// H.264 video encoder
pub struct VideoEncoder {
    encoder: ffmpeg::encoder::Video,
    codec: ffmpeg::Codec,
    time_base: ffmpeg::Rational,
}

impl VideoEncoder {
    pub fn open(name: &str, config: &VideoEncoderConfig) -> Result<Self> {
        let codec = find_encoder(name, codec::Id::H264)?;

        let mut video = codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| {
                FfmpegError::EncoderCreate(format!("Cannot get video encoder handle: {}", e))
            })?;

        video.set_width(config.width);
        video.set_height(config.height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(config.time_base);
        video.set_frame_rate(Some(config.frame_rate));
        if config.global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = ffmpeg::Dictionary::new();
        if codec.name().contains("264") || codec.name().contains("265") {
            options.set("crf", &config.crf.to_string());
            options.set("preset", &config.preset);
        }

        let encoder = video.open_as_with(codec, options).map_err(|e| {
            FfmpegError::EncoderCreate(format!("Failed to open {} encoder: {}", codec.name(), e))
        })?;

        tracing::debug!(
            codec = codec.name(),
            width = config.width,
            height = config.height,
            crf = config.crf,
            "video encoder opened"
        );

        Ok(Self {
            encoder,
            codec,
            time_base: config.time_base,
        })
    }

    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Video) -> Result<()> {
        self.encoder
            .send_frame(frame)
            .map_err(|e| FfmpegError::EncodeFrame(format!("video send_frame: {}", e)).into())
    }

    pub fn send_eof(&mut self) -> Result<()> {
        match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::EncodeFrame(format!("video send_eof: {}", e)).into()),
        }
    }

    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        let result = self.encoder.receive_packet(&mut packet);
        receive(result, packet, "video")
    }

    pub fn codec(&self) -> ffmpeg::Codec {
        self.codec
    }

    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        crate::ffmpeg_utils::codec_parameters(&self.encoder)
    }
}

/// Audio encoder configuration
#[derive(Debug, Clone)]
pub struct AudioEncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u64,
    pub global_header: bool,
}

/// Audio encoder for any fixed or variable frame size codec
pub struct AudioEncoder {
    encoder: ffmpeg::encoder::Audio,
    codec: ffmpeg::Codec,
    sample_rate: u32,
    pts: i64,
}

impl AudioEncoder {
    pub fn open(name: &str, fallback: codec::Id, config: &AudioEncoderConfig) -> Result<Self> {
        let codec = find_encoder(name, fallback)?;
        Self::open_codec(codec, config)
    }

    pub fn open_codec(codec: ffmpeg::Codec, config: &AudioEncoderConfig) -> Result<Self> {
        let caps = codec.audio().map_err(|e| {
            FfmpegError::EncoderCreate(format!("{} is not an audio encoder: {}", codec.name(), e))
        })?;

        let format = match caps.formats() {
            Some(formats) => {
                let formats: Vec<Sample> = formats.collect();
                if formats.contains(&PREFERRED_SAMPLE_FMT) || formats.is_empty() {
                    PREFERRED_SAMPLE_FMT
                } else {
                    formats[0]
                }
            }
            None => PREFERRED_SAMPLE_FMT,
        };

        let sample_rate = match caps.rates() {
            Some(rates) => {
                let rates: Vec<i32> = rates.collect();
                pick_sample_rate(config.sample_rate, &rates)
            }
            None => config.sample_rate,
        };

        let layout = channel_layout(config.channels);

        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderCreate(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio.set_rate(sample_rate as i32);
        audio.set_format(format);
        audio.set_channel_layout(layout);
        audio.set_bit_rate(config.bitrate as usize);
        if config.global_header {
            audio.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = audio.open_as(codec).map_err(|e| {
            FfmpegError::EncoderCreate(format!("Failed to open {} encoder: {}", codec.name(), e))
        })?;

        tracing::debug!(
            codec = codec.name(),
            sample_rate,
            format = format.name(),
            frame_size = encoder.frame_size(),
            "audio encoder opened"
        );

        Ok(Self {
            encoder,
            codec,
            sample_rate,
            pts: 0,
        })
    }

    /// Send a frame, stamping it with a running sample-count pts.
    pub fn send_frame(&mut self, frame: &mut ffmpeg::util::frame::Audio) -> Result<()> {
        frame.set_pts(Some(self.pts));
        self.pts += frame.samples() as i64;
        self.encoder
            .send_frame(frame)
            .map_err(|e| FfmpegError::EncodeFrame(format!("audio send_frame: {}", e)).into())
    }

    pub fn send_eof(&mut self) -> Result<()> {
        match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::EncodeFrame(format!("audio send_eof: {}", e)).into()),
        }
    }

    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        let result = self.encoder.receive_packet(&mut packet);
        receive(result, packet, "audio")
    }

    pub fn codec(&self) -> ffmpeg::Codec {
        self.codec
    }

    /// Samples per frame, 0 for variable frame size encoders.
    pub fn frame_size(&self) -> u32 {
        self.encoder.frame_size()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn format(&self) -> Sample {
        self.encoder.format()
    }

    pub fn channel_layout_name(&self) -> &'static str {
        if self.encoder.channel_layout() == ChannelLayout::MONO {
            "mono"
        } else {
            "stereo"
        }
    }

    /// The output timebase (1 / sample_rate).
    pub fn time_base(&self) -> ffmpeg::Rational {
        ffmpeg::Rational::new(1, self.sample_rate as i32)
    }

    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        crate::ffmpeg_utils::codec_parameters(&self.encoder)
    }
}

/// Mono stays mono; everything else is downmixed to stereo.
pub fn channel_layout(channels: u16) -> ChannelLayout {
    if channels == 1 {
        ChannelLayout::MONO
    } else {
        ChannelLayout::STEREO
    }
}

/// Keep `wanted` when the encoder supports it, otherwise the closest rate.
pub fn pick_sample_rate(wanted: u32, supported: &[i32]) -> u32 {
    if supported.is_empty() || supported.contains(&(wanted as i32)) {
        return wanted;
    }
    supported
        .iter()
        .copied()
        .filter(|r| *r > 0)
        .min_by_key(|r| (*r as i64 - wanted as i64).abs())
        .map(|r| r as u32)
        .unwrap_or(wanted)
}

/// Audio codec implied by an output file extension
pub fn audio_codec_for_extension(ext: &str) -> Option<codec::Id> {
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => Some(codec::Id::MP3),
        "m4a" | "aac" | "mp4" => Some(codec::Id::AAC),
        "wav" => Some(codec::Id::PCM_S16LE),
        "flac" => Some(codec::Id::FLAC),
        "ogg" | "oga" => Some(codec::Id::VORBIS),
        "opus" => Some(codec::Id::OPUS),
        _ => None,
    }
}

/// Round a dimension down to the even value 4:2:0 chroma subsampling needs.
pub fn even(dim: u32) -> u32 {
    dim & !1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_sample_rate() {
        assert_eq!(pick_sample_rate(44100, &[]), 44100);
        assert_eq!(pick_sample_rate(44100, &[48000, 44100, 32000]), 44100);
        assert_eq!(pick_sample_rate(44000, &[48000, 44100, 32000]), 44100);
        assert_eq!(pick_sample_rate(96000, &[48000, 44100]), 48000);
    }

    #[test]
    fn test_audio_codec_for_extension() {
        assert_eq!(audio_codec_for_extension("mp3"), Some(codec::Id::MP3));
        assert_eq!(audio_codec_for_extension("MP3"), Some(codec::Id::MP3));
        assert_eq!(audio_codec_for_extension("m4a"), Some(codec::Id::AAC));
        assert_eq!(audio_codec_for_extension("txt"), None);
    }

    #[test]
    fn test_even() {
        assert_eq!(even(960), 960);
        assert_eq!(even(541), 540);
        assert_eq!(even(1), 0);
    }

    #[test]
    fn test_channel_layout() {
        assert_eq!(channel_layout(1), ChannelLayout::MONO);
        assert_eq!(channel_layout(2), ChannelLayout::STEREO);
        assert_eq!(channel_layout(6), ChannelLayout::STEREO);
    }

    #[test]
    fn test_aac_encoder_opens() {
        let Some(codec) = ffmpeg::encoder::find(codec::Id::AAC) else {
            return;
        };
        let enc = AudioEncoder::open_codec(
            codec,
            &AudioEncoderConfig {
                sample_rate: 48000,
                channels: 2,
                bitrate: 128_000,
                global_header: false,
            },
        );
        assert!(enc.is_ok(), "AAC encoder should open: {:?}", enc.err());
        let enc = enc.unwrap();
        assert_eq!(enc.time_base(), ffmpeg::Rational::new(1, 48000));
        assert_eq!(enc.channel_layout_name(), "stereo");
    }
}
