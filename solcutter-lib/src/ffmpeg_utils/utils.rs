//! FFmpeg utility functions

use ffmpeg_next as ffmpeg;

/// Convert seconds to a timestamp in `time_base`
pub fn secs_to_ts(secs: f64, time_base: ffmpeg::Rational) -> i64 {
    if time_base.numerator() == 0 {
        return 0;
    }
    (secs * time_base.denominator() as f64 / time_base.numerator() as f64).round() as i64
}

/// Convert a timestamp in `time_base` to seconds
pub fn ts_to_secs(ts: i64, time_base: ffmpeg::Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    ts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rational as a plain `f64`, `0.0` for an unset value
pub fn rational_to_f64(r: ffmpeg::Rational) -> f64 {
    if r.denominator() == 0 {
        0.0
    } else {
        r.numerator() as f64 / r.denominator() as f64
    }
}

/// Codec parameters describing an opened encoder, for muxer stream setup.
///
/// Built by copying the encoder's AVCodecContext into a fresh
/// AVCodecParameters struct.
pub fn codec_parameters(ctx: &ffmpeg::codec::Context) -> ffmpeg::codec::Parameters {
    use std::rc::Rc;
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}
