//! Transcoding building blocks
//!
//! - Video and audio decoders for the source streams
//! - Filter graphs for time-accurate slicing, cropping and format conversion
//! - H.264 / AAC / MP3 encoders
//! - Output container writer

pub mod decoder;
pub mod encoder;
pub mod filter;
pub mod muxer;
