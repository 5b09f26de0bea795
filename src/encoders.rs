use anyhow::{anyhow, bail, Context as _, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::software::scaling::{context::Context as Scaler, flag::Flags as ScalingFlags};
use ffmpeg_next::{codec, decoder, encoder, frame, Dictionary, Packet, Rational};
use log::debug;

use crate::cli::VideoCodec;
use crate::media;
use crate::refs::PacketReferences;

pub fn codec_id(codec: VideoCodec) -> codec::Id {
    match codec {
        VideoCodec::Ffv1 => codec::Id::FFV1,
        VideoCodec::Huffyuv => codec::Id::HUFFYUV,
    }
}

/// Per-stream compressor. `Video` re-encodes raw video packets with a
/// lossless codec; `Copy` passes every other stream through untouched.
pub enum Encoder {
    Video(VideoEncoder),
    Copy(CopyEncoder),
}

impl Encoder {
    pub fn process_packet(
        &mut self,
        packet: &Packet,
        octx: &mut Output,
        refs: &mut PacketReferences,
    ) -> Result<()> {
        match self {
            Encoder::Video(e) => e.process_packet(packet, octx, refs),
            Encoder::Copy(e) => e.process_packet(packet, octx, refs),
        }
    }

    /// Drain codec pipelines at end of input. The per-packet cadence is
    /// strictly one-in one-out, so anything still buffered is an error.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            Encoder::Video(e) => e.finish(),
            Encoder::Copy(_) => Ok(()),
        }
    }
}

/// Emission state shared by both encoder kinds: the output stream identity
/// and the running packet counter that orders the reference table.
struct PacketWriter {
    in_time_base: Rational,
    out_stream_index: usize,
    out_packet_index: u64,
}

impl PacketWriter {
    fn new(input_stream: &Stream, out_stream_index: usize) -> Self {
        Self {
            in_time_base: input_stream.time_base(),
            out_stream_index,
            out_packet_index: 0,
        }
    }

    fn finalize_and_write(
        &mut self,
        input_packet: &Packet,
        mut output_packet: Packet,
        octx: &mut Output,
        refs: &mut PacketReferences,
    ) -> Result<()> {
        let orig_pos = input_packet.position();
        if orig_pos < 0 {
            bail!("input packet has no source position");
        }

        let out_time_base = octx
            .stream(self.out_stream_index)
            .ok_or_else(|| anyhow!("output stream {} missing", self.out_stream_index))?
            .time_base();

        output_packet.set_stream(self.out_stream_index);
        output_packet.set_pts(input_packet.pts());
        output_packet.set_dts(input_packet.dts());
        output_packet.set_duration(input_packet.duration());
        output_packet.rescale_ts(self.in_time_base, out_time_base);

        debug!(
            " -> Output packet: Stream #0:{} (index {} size {}) - pts {:?} dts {:?} duration {}",
            self.out_stream_index,
            self.out_packet_index,
            output_packet.size(),
            output_packet.pts(),
            output_packet.dts(),
            output_packet.duration()
        );

        refs.add_packet_reference(
            self.out_stream_index as u32,
            self.out_packet_index,
            media::raw_pts(output_packet.pts()),
            orig_pos as u64,
            input_packet.size() as u32,
        )?;

        output_packet
            .write_interleaved(octx)
            .context("write interleaved packet")?;

        self.out_packet_index += 1;
        Ok(())
    }
}

pub struct VideoEncoder {
    writer: PacketWriter,
    decoder: decoder::Video,
    encoder: encoder::Video,
    scaler: Scaler,
    input_frame: frame::Video,
    output_frame: frame::Video,
}

impl VideoEncoder {
    pub fn new(
        input_stream: &Stream,
        octx: &mut Output,
        refs: &mut PacketReferences,
        output_codec: VideoCodec,
        options: &[(String, String)],
    ) -> Result<Self> {
        let out_stream_index = {
            let ost = octx
                .add_stream(encoder::find(codec::Id::None))
                .context("allocate output stream")?;
            ost.index()
        };

        let decoder = codec::context::Context::from_parameters(input_stream.parameters())
            .context("raw decoder parameters")?
            .decoder()
            .video()
            .context("open raw video decoder")?;

        let codec_id = codec_id(output_codec);
        let encoder_codec =
            encoder::find(codec_id).ok_or_else(|| anyhow!("encoder {:?} not available", codec_id))?;

        let candidates = encoder_codec
            .video()
            .context("encoder capabilities")?
            .formats()
            .ok_or_else(|| anyhow!("encoder {:?} advertises no pixel formats", codec_id))?;
        let output_format = media::select_lossless_pixel_format(decoder.format(), candidates)?;

        let mut encoder_ctx = codec::context::Context::new_with_codec(encoder_codec)
            .encoder()
            .video()
            .context("video encoder context")?;
        encoder_ctx.set_width(decoder.width());
        encoder_ctx.set_height(decoder.height());
        encoder_ctx.set_aspect_ratio(decoder.aspect_ratio());
        encoder_ctx.set_format(output_format);
        encoder_ctx.set_time_base(input_stream.time_base());
        encoder_ctx.set_frame_rate(Some(input_stream.avg_frame_rate()));

        let mut dict = Dictionary::new();
        for (key, value) in options {
            dict.set(key, value);
        }
        let encoder = encoder_ctx.open_with(dict).context("open video encoder")?;

        // The sidecar stream row records the input pixel format: that is the
        // format the decompression pass must restore, not the encoder's.
        refs.add_video_stream(media::pixel_format_name(decoder.format())?);

        {
            let mut ost = octx
                .stream_mut(out_stream_index)
                .ok_or_else(|| anyhow!("output stream {} missing", out_stream_index))?;
            ost.set_parameters(&encoder);
            ost.set_time_base(input_stream.time_base());
            unsafe {
                let st = ost.as_mut_ptr();
                (*st).avg_frame_rate = input_stream.avg_frame_rate().into();
                (*st).duration = input_stream.duration();
                (*(*st).codecpar).codec_tag = 0;
            }
        }

        let scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            output_format,
            encoder.width(),
            encoder.height(),
            ScalingFlags::empty(),
        )
        .context("pixel format converter")?;

        // Fresh frames carry no key-frame flag; only the interlacing layout
        // of the input stream is carried over.
        let mut output_frame = frame::Video::new(output_format, encoder.width(), encoder.height());
        let field_order = unsafe { (*input_stream.parameters().as_ptr()).field_order };
        unsafe {
            let f = output_frame.as_mut_ptr();
            if field_order != ffi::AVFieldOrder::AV_FIELD_PROGRESSIVE {
                (*f).flags |= ffi::AV_FRAME_FLAG_INTERLACED as i32;
            }
            if matches!(
                field_order,
                ffi::AVFieldOrder::AV_FIELD_TT | ffi::AVFieldOrder::AV_FIELD_TB
            ) {
                (*f).flags |= ffi::AV_FRAME_FLAG_TOP_FIELD_FIRST as i32;
            }
        }

        Ok(Self {
            writer: PacketWriter::new(input_stream, out_stream_index),
            decoder,
            encoder,
            scaler,
            input_frame: frame::Video::empty(),
            output_frame,
        })
    }

    fn process_packet(
        &mut self,
        packet: &Packet,
        octx: &mut Output,
        refs: &mut PacketReferences,
    ) -> Result<()> {
        self.decoder
            .send_packet(packet)
            .context("send packet to raw video decoder")?;
        self.decoder
            .receive_frame(&mut self.input_frame)
            .context("raw video decoder produced no frame")?;

        debug!(
            " -> Decoded {}x{} {} pts {:?}",
            self.input_frame.width(),
            self.input_frame.height(),
            media::pixel_format_name(self.input_frame.format()).unwrap_or("?"),
            self.input_frame.pts()
        );
        debug!(
            " -> Converting from {} to {}",
            media::pixel_format_name(self.input_frame.format()).unwrap_or("?"),
            media::pixel_format_name(self.output_frame.format()).unwrap_or("?")
        );

        let ret = unsafe { ffi::av_frame_make_writable(self.output_frame.as_mut_ptr()) };
        if ret < 0 {
            return Err(ffmpeg::Error::from(ret)).context("make output frame writable");
        }
        self.scaler
            .run(&self.input_frame, &mut self.output_frame)
            .context("pixel format conversion")?;
        self.output_frame.set_pts(self.input_frame.pts());

        self.encoder
            .send_frame(&self.output_frame)
            .context("send frame to video encoder")?;
        let mut output_packet = Packet::empty();
        self.encoder
            .receive_packet(&mut output_packet)
            .context("video encoder produced no packet")?;

        self.writer
            .finalize_and_write(packet, output_packet, octx, refs)
    }

    fn finish(&mut self) -> Result<()> {
        self.decoder.send_eof().context("flush raw video decoder")?;
        if self.decoder.receive_frame(&mut self.input_frame).is_ok() {
            bail!("raw video decoder held back frames at end of stream");
        }

        self.encoder.send_eof().context("flush video encoder")?;
        let mut packet = Packet::empty();
        if self.encoder.receive_packet(&mut packet).is_ok() {
            bail!("video encoder held back packets at end of stream");
        }

        Ok(())
    }
}

pub struct CopyEncoder {
    writer: PacketWriter,
}

impl CopyEncoder {
    pub fn new(input_stream: &Stream, octx: &mut Output, refs: &mut PacketReferences) -> Result<Self> {
        let out_stream_index = {
            let mut ost = octx
                .add_stream(encoder::find(codec::Id::None))
                .context("allocate output stream")?;
            ost.set_parameters(input_stream.parameters());
            unsafe {
                (*(*ost.as_mut_ptr()).codecpar).codec_tag = 0;
            }
            ost.index()
        };

        refs.add_copy_stream();

        Ok(Self {
            writer: PacketWriter::new(input_stream, out_stream_index),
        })
    }

    fn process_packet(
        &mut self,
        packet: &Packet,
        octx: &mut Output,
        refs: &mut PacketReferences,
    ) -> Result<()> {
        self.writer
            .finalize_and_write(packet, packet.clone(), octx, refs)
    }
}
