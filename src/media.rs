use std::ffi::CString;
use std::path::Path;

use anyhow::{anyhow, bail, Context as _, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use log::debug;

/// FFmpeg's AV_NOPTS_VALUE. Timestamps carry this sentinel on the wire when
/// the packet has no timestamp; the reference table stores it verbatim so
/// reverse-index keys match on re-demux.
pub const NO_PTS: i64 = i64::MIN;

pub fn init() -> Result<()> {
    ffmpeg::init().context("initialize multimedia library")
}

pub fn open_input(path: &Path) -> Result<ffmpeg::format::context::Input> {
    let input = ffmpeg::format::input(&path)
        .with_context(|| format!("open input container {}", path.display()))?;

    debug!("Input streams:");
    for stream in input.streams() {
        debug!(
            "  Stream #0:{}: codec={:?} time_base={:?}",
            stream.index(),
            stream.parameters().id(),
            stream.time_base()
        );
    }

    Ok(input)
}

pub fn open_matroska_output(path: &Path) -> Result<ffmpeg::format::context::Output> {
    ffmpeg::format::output_as(&path, "matroska")
        .with_context(|| format!("open output container {}", path.display()))
}

pub fn raw_pts(pts: Option<i64>) -> i64 {
    pts.unwrap_or(NO_PTS)
}

pub fn pixel_format_name(format: ffmpeg::format::Pixel) -> Result<&'static str> {
    format
        .descriptor()
        .map(|d| d.name())
        .ok_or_else(|| anyhow!("pixel format has no descriptor"))
}

pub fn pixel_format_from_name(name: &str) -> Result<ffmpeg::format::Pixel> {
    let cname = CString::new(name).context("pixel format name contains NUL")?;
    let format = ffmpeg::format::Pixel::from(unsafe { ffi::av_get_pix_fmt(cname.as_ptr()) });
    if format == ffmpeg::format::Pixel::None {
        bail!("invalid pixel format string: {}", name);
    }
    Ok(format)
}

/// Pick the first candidate that converts to and from `src` with zero loss
/// in both directions. Anything less would break byte-exact reconstruction.
pub fn select_lossless_pixel_format(
    src: ffmpeg::format::Pixel,
    candidates: impl Iterator<Item = ffmpeg::format::Pixel>,
) -> Result<ffmpeg::format::Pixel> {
    debug!(
        "   -> Input pixel format: {}",
        pixel_format_name(src).unwrap_or("?")
    );

    let src_av: ffi::AVPixelFormat = src.into();
    let mut result = None;

    for candidate in candidates {
        let candidate_av: ffi::AVPixelFormat = candidate.into();
        let losses = unsafe { ffi::av_get_pix_fmt_loss(candidate_av, src_av, 0) };
        let losses_inv = unsafe { ffi::av_get_pix_fmt_loss(src_av, candidate_av, 1) };

        debug!(
            "   -> Candidate output pixel format: {} loss=0x{:x} inverse_loss=0x{:x}",
            pixel_format_name(candidate).unwrap_or("?"),
            losses,
            losses_inv
        );

        if losses == 0 && losses_inv == 0 && result.is_none() {
            result = Some(candidate);
        }
    }

    result.ok_or_else(|| anyhow!("failed to select a lossless round-trip output pixel format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pts_maps_missing_to_sentinel() {
        assert_eq!(raw_pts(None), NO_PTS);
        assert_eq!(raw_pts(Some(42)), 42);
    }
}
