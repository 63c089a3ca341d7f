//! Output container writer

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result};

/// A muxer writing to a file; the container is picked from the extension
pub struct OutputFile {
    octx: ffmpeg::format::context::Output,
    path: PathBuf,
    /// (encoder time base, output stream index) per added stream
    streams: Vec<(ffmpeg::Rational, usize)>,
    header_written: bool,
}

impl OutputFile {
    pub fn create(path: &Path) -> Result<Self> {
        let octx = ffmpeg::format::output(&path).map_err(|e| {
            FfmpegError::MuxerCreate(format!("cannot create {:?}: {}", path, e))
        })?;
        Ok(Self {
            octx,
            path: path.to_path_buf(),
            streams: Vec::new(),
            header_written: false,
        })
    }

    /// Whether encoders must put codec headers in extradata (MP4 does).
    pub fn needs_global_header(&self) -> bool {
        self.octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
    }

    /// Add a stream for an opened encoder; returns the handle used by `write`.
    pub fn add_stream(
        &mut self,
        codec: ffmpeg::Codec,
        parameters: ffmpeg::codec::Parameters,
        encoder_time_base: ffmpeg::Rational,
    ) -> Result<usize> {
        let mut stream = self.octx.add_stream(codec).map_err(|e| {
            FfmpegError::MuxerCreate(format!("add_stream for {}: {}", codec.name(), e))
        })?;
        stream.set_parameters(parameters);
        stream.set_time_base(encoder_time_base);
        let index = stream.index();
        self.streams.push((encoder_time_base, index));
        Ok(self.streams.len() - 1)
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.octx
            .write_header()
            .map_err(|e| FfmpegError::WriteHeader(format!("{:?}: {}", self.path, e)))?;
        self.header_written = true;
        Ok(())
    }

    /// Write an encoded packet for the stream `handle`, rescaling its timestamps.
    pub fn write(&mut self, handle: usize, mut packet: ffmpeg::codec::packet::Packet) -> Result<()> {
        let (encoder_tb, index) = self.streams[handle];
        let stream_tb = self
            .octx
            .stream(index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_tb);
        packet.set_stream(index);
        packet.rescale_ts(encoder_tb, stream_tb);
        packet
            .write_interleaved(&mut self.octx)
            .map_err(|e| FfmpegError::WritePacket(format!("stream {}: {}", index, e)).into())
    }

    pub fn finish(mut self) -> Result<()> {
        if !self.header_written {
            return Ok(());
        }
        self.octx
            .write_trailer()
            .map_err(|e| FfmpegError::WriteTrailer(format!("{:?}: {}", self.path, e)))?;
        Ok(())
    }
}
