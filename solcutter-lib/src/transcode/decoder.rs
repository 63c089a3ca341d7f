//! Decoders for the export pipeline
//!
//! Thin wrappers over FFmpeg decoder contexts that turn compressed packets
//! from the source into raw video or PCM frames.

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result};

fn open_context(stream: &ffmpeg::format::stream::Stream) -> Result<ffmpeg::codec::Context> {
    let mut context =
        ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "Failed to create codec context for stream {}: {}",
                stream.index(),
                e
            ))
        })?;
    // Decoders use this to interpret packet timestamps and skip-sample side data.
    unsafe {
        (*context.as_mut_ptr()).pkt_timebase = stream.time_base().into();
    }
    Ok(context)
}

/// Map "needs more input" and "drained" to `None`, everything else to an error.
fn receive<T>(result: std::result::Result<(), ffmpeg::Error>, frame: T, stream_index: usize) -> Result<Option<T>> {
    match result {
        Ok(()) => Ok(Some(frame)),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
        Err(ffmpeg::Error::Eof) => Ok(None),
        Err(e) => Err(FfmpegError::DecodePacket(format!(
            "receive_frame error on stream {}: {}",
            stream_index, e
        ))
        .into()),
    }
}

/// Video decoder for the source's video stream
pub struct VideoDecoder {
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: ffmpeg::Rational,
}

impl VideoDecoder {
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let decoder = open_context(stream)?.decoder().video().map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "Failed to open video decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        Ok(Self {
            decoder,
            stream_index,
            time_base: stream.time_base(),
        })
    }

    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(()),
            // Damaged packets right after a seek are common; keep going.
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(stream_index = self.stream_index, "skipping invalid video packet");
                Ok(())
            }
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Receive one decoded frame with its pts set to the best-effort timestamp.
    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Video>> {
        let mut frame = ffmpeg::util::frame::Video::empty();
        let result = self.decoder.receive_frame(&mut frame);
        let frame = receive(result, frame, self.stream_index)?;
        Ok(frame.map(|mut f| {
            let ts = f.timestamp();
            f.set_pts(ts);
            f
        }))
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    pub fn format(&self) -> ffmpeg::format::Pixel {
        self.decoder.format()
    }

    /// Sample aspect ratio, `1/1` when the stream does not declare one.
    pub fn aspect_ratio(&self) -> ffmpeg::Rational {
        let sar = self.decoder.aspect_ratio();
        if sar.numerator() <= 0 || sar.denominator() <= 0 {
            ffmpeg::Rational::new(1, 1)
        } else {
            sar
        }
    }
}

/// Audio decoder for the source's audio stream
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
    time_base: ffmpeg::Rational,
}

impl AudioDecoder {
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let decoder = open_context(stream)?.decoder().audio().map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "Failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        Ok(Self {
            decoder,
            stream_index,
            time_base: stream.time_base(),
        })
    }

    /// Send a compressed packet to the decoder.
    ///
    /// `AVERROR_INVALIDDATA` is non-fatal: some decoders emit it for pre-roll
    /// packets right after a seek.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(stream_index = self.stream_index, "skipping invalid audio packet");
                Ok(())
            }
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        let result = self.decoder.receive_frame(&mut frame);
        let frame = receive(result, frame, self.stream_index)?;
        Ok(frame.map(|mut f| {
            let ts = f.timestamp();
            f.set_pts(ts);
            f
        }))
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.rate()
    }

    pub fn channels(&self) -> u16 {
        self.decoder.channels()
    }

    pub fn format(&self) -> ffmpeg::util::format::sample::Sample {
        self.decoder.format()
    }

    /// Channel layout bits, derived from the channel count when unset.
    pub fn channel_layout_bits(&self) -> u64 {
        use ffmpeg::util::channel_layout::ChannelLayout;

        let layout = self.decoder.channel_layout();
        if layout.bits() != 0 {
            return layout.bits();
        }
        match self.channels() {
            1 => ChannelLayout::MONO.bits(),
            _ => ChannelLayout::STEREO.bits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_decoders_present() {
        for id in [
            ffmpeg::codec::Id::H264,
            ffmpeg::codec::Id::AAC,
            ffmpeg::codec::Id::MP3,
        ] {
            assert!(ffmpeg::codec::decoder::find(id).is_some(), "missing decoder {:?}", id);
        }
    }
}
