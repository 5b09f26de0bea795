use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "llrzip",
    version,
    about = "Losslessly compress raw streams in multimedia containers"
)]
pub struct Args {
    /// Input file
    #[arg(short = 'i', long = "input", value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (.mkv when compressing)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Decompress instead of compressing
    #[arg(short = 'd', long = "decompress", default_value_t = false)]
    pub decompress: bool,

    /// Lossless video codec for raw streams (compression only)
    #[arg(short = 'v', long = "video-codec", value_enum, default_value_t = VideoCodec::Ffv1)]
    pub video_codec: VideoCodec,

    /// Video codec option, may be repeated (compression only)
    #[arg(long = "codec-opt", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub codec_opts: Vec<(String, String)>,

    /// Hash algorithm recorded in the .llr sidecar
    #[arg(long = "hash", value_name = "NAME", default_value = "MD5")]
    pub hash: String,

    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Per-packet trace output
    #[arg(long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Ffv1,
    Huffyuv,
}

/// Stock FFV1 tuning, applied when the user supplies no options.
pub const DEFAULT_FFV1_OPTIONS: &[(&str, &str)] = &[
    ("level", "3"),
    ("slicecrc", "0"),
    ("context", "1"),
    ("coder", "range_def"),
    ("g", "600"),
    ("slices", "4"),
];

impl Args {
    pub fn video_codec_options(&self) -> Vec<(String, String)> {
        if !self.codec_opts.is_empty() {
            return self.codec_opts.clone();
        }
        match self.video_codec {
            VideoCodec::Ffv1 => DEFAULT_FFV1_OPTIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            VideoCodec::Huffyuv => Vec::new(),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid codec option format (expected KEY=VALUE): {s}"))?;
    if key.is_empty() || value.is_empty() {
        return Err(format!("invalid codec option format (expected KEY=VALUE): {s}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// The `.llr` sidecar sits next to the `.mkv` half of the pair; any other
/// extension is an argument error.
pub fn llr_path_for(mkv: &Path) -> Option<PathBuf> {
    if mkv
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("mkv"))
    {
        Some(mkv.with_extension("llr"))
    } else {
        None
    }
}
