use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use crate::cli::{self, Args};
use crate::decoders::{CopyDecoder, Decoder, VideoDecoder};
use crate::encoders::{CopyEncoder, Encoder, VideoEncoder};
use crate::hash::{format_digest, hash_file, HashAlgorithm};
use crate::llr;
use crate::media;
use crate::refs::{PacketReferences, StreamInfo};
use crate::ui;

const PB_STYLE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const PB_CHARS: &str = "█▆▄ ";

pub fn execute(args: &Args) -> Result<()> {
    media::init()?;

    if args.decompress {
        decompress(args)
    } else {
        compress(args)
    }
}

fn progress_bar(total: u64, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PB_STYLE)
            .unwrap()
            .progress_chars(PB_CHARS),
    );
    Some(pb)
}

fn check_duplicate_options(options: &[(String, String)]) -> Result<()> {
    for (i, (key, _)) in options.iter().enumerate() {
        if options[..i].iter().any(|(seen, _)| seen == key) {
            bail!("codec option set more than once: {}", key);
        }
    }
    Ok(())
}

pub fn compress(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    let algorithm = HashAlgorithm::from_name(&args.hash).ok_or_else(|| {
        anyhow!(
            "unsupported hash algorithm {} (available: {})",
            args.hash,
            HashAlgorithm::names().join(", ")
        )
    })?;

    let llr_path = cli::llr_path_for(&args.output)
        .ok_or_else(|| anyhow!("argument error: OUTPUT must end with .mkv"))?;

    let options = args.video_codec_options();
    check_duplicate_options(&options)?;

    let mut ictx = media::open_input(&args.input)?;
    let mut octx = media::open_matroska_output(&args.output)?;

    let mut refs = PacketReferences::new();
    let mut encoders = Vec::new();

    debug!("Encoders:");
    for stream in ictx.streams() {
        let encoder = if stream.parameters().id() == ffmpeg::codec::Id::RAWVIDEO {
            debug!(
                "  Stream #0:{}: input_codec=rawvideo output_codec={:?}",
                stream.index(),
                args.video_codec
            );
            Encoder::Video(VideoEncoder::new(
                &stream,
                &mut octx,
                &mut refs,
                args.video_codec,
                &options,
            )?)
        } else {
            debug!(
                "  Stream #0:{}: input_codec={:?} output_codec=copy",
                stream.index(),
                stream.parameters().id()
            );
            Encoder::Copy(CopyEncoder::new(&stream, &mut octx, &mut refs)?)
        };
        encoders.push(encoder);
    }

    let mut llr_file = File::create(&llr_path)
        .with_context(|| format!("create LLR file {}", llr_path.display()))?;

    octx.write_header().context("write container header")?;

    let input_size = std::fs::metadata(&args.input)
        .with_context(|| format!("stat input file {}", args.input.display()))?
        .len();
    let pb = progress_bar(input_size, args.quiet);

    let mut packet = ffmpeg::Packet::empty();
    loop {
        match packet.read(&mut ictx) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => break,
            Err(e) => return Err(e).context("read input packet"),
        }

        debug!(
            "Input packet: Stream #0:{} (pos {} size {}) - pts {:?} dts {:?} duration {}",
            packet.stream(),
            packet.position(),
            packet.size(),
            packet.pts(),
            packet.dts(),
            packet.duration()
        );

        let stream_index = packet.stream();
        let encoder = encoders
            .get_mut(stream_index)
            .ok_or_else(|| anyhow!("packet for unknown stream {}", stream_index))?;
        encoder.process_packet(&packet, &mut octx, &mut refs)?;

        if let Some(pb) = &pb {
            pb.inc(packet.size() as u64);
        }
    }

    for encoder in &mut encoders {
        encoder.finish()?;
    }

    refs.dump();

    let mut source = File::open(&args.input)
        .with_context(|| format!("open input file {}", args.input.display()))?;
    let digest = llr::write_llr(&mut source, &refs, &mut llr_file, algorithm)
        .with_context(|| format!("write LLR file {}", llr_path.display()))?;
    debug!("{} digest: {}", algorithm.name(), format_digest(&digest));

    octx.write_trailer().context("write container trailer")?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        let container_size = std::fs::metadata(&args.output).map(|m| m.len()).unwrap_or(0);
        let llr_size = std::fs::metadata(&llr_path).map(|m| m.len()).unwrap_or(0);
        ui::print_summary(
            "Compression",
            input_size,
            container_size,
            llr_size,
            start_time.elapsed(),
        );
    }

    Ok(())
}

pub fn decompress(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    let llr_path = cli::llr_path_for(&args.input)
        .ok_or_else(|| anyhow!("argument error: INPUT must end with .mkv"))?;

    let mut ictx = media::open_input(&args.input)?;

    let mut llr_file = File::open(&llr_path)
        .with_context(|| format!("open LLR file {}", llr_path.display()))?;
    let mut out_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.output)
        .with_context(|| format!("create output file {}", args.output.display()))?;

    let (info, refs) = llr::read_llr(&mut llr_file, &mut out_file)
        .with_context(|| format!("parse LLR file {}", llr_path.display()))?;

    let algorithm = HashAlgorithm::from_name(&info.hash_name).ok_or_else(|| {
        anyhow!("unsupported hash algorithm in LLR file: {}", info.hash_name)
    })?;
    if info.hash_buffer.len() != algorithm.digest_len() {
        bail!(
            "LLR hash slot holds {} bytes, {} expects {}",
            info.hash_buffer.len(),
            algorithm.name(),
            algorithm.digest_len()
        );
    }

    // Sparse-allocate the full original size; gap ranges are already in
    // place, packet decoders fill the rest.
    out_file.set_len(info.original_file_size)?;

    let stream_count = ictx.streams().count();
    if refs.streams().len() != stream_count {
        bail!(
            "stream count mismatch: {} in LLR file, {} in container",
            refs.streams().len(),
            stream_count
        );
    }

    debug!("Decoders:");
    let mut decoders = Vec::with_capacity(stream_count);
    for stream in ictx.streams() {
        let decoder = match &refs.streams()[stream.index()] {
            StreamInfo::Video { pixel_format } => {
                debug!("  Stream #0:{}: rawvideo {}", stream.index(), pixel_format);
                let format = media::pixel_format_from_name(pixel_format)?;
                Decoder::Video(VideoDecoder::new(&stream, format)?)
            }
            StreamInfo::Copy => {
                debug!("  Stream #0:{}: copy", stream.index());
                Decoder::Copy(CopyDecoder)
            }
        };
        decoders.push(decoder);
    }

    // Reverse packet mapping (streamIndex, packetIndex, pts) -> (origPos, origSize)
    let mut reverse_refs: HashMap<(u32, u64, i64), (u64, u32)> = HashMap::new();
    for (orig_pos, e) in refs.table() {
        reverse_refs.insert(
            (e.stream_index, e.packet_index, e.pts),
            (*orig_pos, e.orig_size),
        );
    }

    let pb = progress_bar(info.original_file_size, args.quiet);

    let mut packet_index_per_stream = vec![0u64; stream_count];
    let mut packet = ffmpeg::Packet::empty();
    loop {
        match packet.read(&mut ictx) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => break,
            Err(e) => return Err(e).context("read input packet"),
        }

        let stream_index = packet.stream();
        let counter = packet_index_per_stream
            .get_mut(stream_index)
            .ok_or_else(|| anyhow!("packet for unknown stream {}", stream_index))?;
        let packet_index = *counter;
        *counter += 1;

        debug!(
            "Input packet: Stream #0:{} (index {}) - pts {:?} dts {:?} duration {}",
            stream_index,
            packet_index,
            packet.pts(),
            packet.dts(),
            packet.duration()
        );

        let key = (stream_index as u32, packet_index, media::raw_pts(packet.pts()));
        let (orig_pos, orig_size) = reverse_refs
            .remove(&key)
            .ok_or_else(|| anyhow!("failed to find destination block"))?;

        let data = decoders[stream_index].decode_packet(&packet)?;
        if data.len() != orig_size as usize {
            bail!(
                "decoded to {} bytes (actual) instead of {} bytes (expected)",
                data.len(),
                orig_size
            );
        }

        debug!(
            " -> {}-{}: writing {} bytes",
            orig_pos,
            orig_pos + data.len() as u64,
            data.len()
        );
        out_file.seek(SeekFrom::Start(orig_pos))?;
        out_file.write_all(&data)?;

        if let Some(pb) = &pb {
            pb.inc(data.len() as u64);
        }
    }

    if !reverse_refs.is_empty() {
        bail!(
            "one or more source packets are missing ({} unmatched)",
            reverse_refs.len()
        );
    }

    out_file.flush()?;
    drop(out_file);

    let digest = hash_file(&args.output, algorithm)?;
    if digest != info.hash_buffer {
        bail!(
            "{} mismatch: expected {}, calculated {}",
            algorithm.name(),
            format_digest(&info.hash_buffer),
            format_digest(&digest)
        );
    }
    debug!("{} digest verified: {}", algorithm.name(), format_digest(&digest));

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        let container_size = std::fs::metadata(&args.input).map(|m| m.len()).unwrap_or(0);
        let llr_size = std::fs::metadata(&llr_path).map(|m| m.len()).unwrap_or(0);
        ui::print_summary(
            "Decompression",
            info.original_file_size,
            container_size,
            llr_size,
            start_time.elapsed(),
        );
    }

    Ok(())
}
