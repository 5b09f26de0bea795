use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::software::scaling::{context::Context as Scaler, flag::Flags as ScalingFlags};
use ffmpeg_next::{codec, decoder, encoder, format, frame, Dictionary, Packet};
use log::debug;

use crate::media;

/// Per-stream inverse of the compression-side encoders: yields the packet
/// payload exactly as it appeared in the original container.
pub enum Decoder {
    Video(VideoDecoder),
    Copy(CopyDecoder),
}

impl Decoder {
    pub fn decode_packet(&mut self, packet: &Packet) -> Result<Vec<u8>> {
        match self {
            Decoder::Video(d) => d.decode_packet(packet),
            Decoder::Copy(d) => d.decode_packet(packet),
        }
    }
}

pub struct VideoDecoder {
    decoder: decoder::Video,
    encoder: encoder::Video,
    scaler: Scaler,
    input_frame: frame::Video,
    output_frame: frame::Video,
}

impl VideoDecoder {
    /// `output_pixel_format` is the original raw format recorded in the
    /// sidecar stream table.
    pub fn new(input_stream: &Stream, output_pixel_format: format::Pixel) -> Result<Self> {
        let decoder = codec::context::Context::from_parameters(input_stream.parameters())
            .context("compressed decoder parameters")?
            .decoder()
            .video()
            .context("open compressed video decoder")?;

        let raw_codec = encoder::find(codec::Id::RAWVIDEO)
            .ok_or_else(|| anyhow!("rawvideo encoder not available"))?;

        let mut encoder_ctx = codec::context::Context::new_with_codec(raw_codec)
            .encoder()
            .video()
            .context("rawvideo encoder context")?;
        encoder_ctx.set_width(decoder.width());
        encoder_ctx.set_height(decoder.height());
        encoder_ctx.set_aspect_ratio(decoder.aspect_ratio());
        encoder_ctx.set_format(output_pixel_format);
        encoder_ctx.set_time_base(input_stream.time_base());
        let encoder = encoder_ctx
            .open_with(Dictionary::new())
            .context("open rawvideo encoder")?;

        let scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            output_pixel_format,
            decoder.width(),
            decoder.height(),
            ScalingFlags::empty(),
        )
        .context("pixel format converter")?;

        let output_frame =
            frame::Video::new(output_pixel_format, decoder.width(), decoder.height());

        Ok(Self {
            decoder,
            encoder,
            scaler,
            input_frame: frame::Video::empty(),
            output_frame,
        })
    }

    fn decode_packet(&mut self, packet: &Packet) -> Result<Vec<u8>> {
        self.decoder
            .send_packet(packet)
            .context("send packet to video decoder")?;
        self.decoder
            .receive_frame(&mut self.input_frame)
            .context("video decoder produced no frame")?;

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
            .context("send frame to rawvideo encoder")?;
        let mut output_packet = Packet::empty();
        self.encoder
            .receive_packet(&mut output_packet)
            .context("rawvideo encoder produced no packet")?;

        output_packet
            .data()
            .map(|d| d.to_vec())
            .ok_or_else(|| anyhow!("rawvideo encoder produced an empty packet"))
    }
}

pub struct CopyDecoder;

impl CopyDecoder {
    fn decode_packet(&mut self, packet: &Packet) -> Result<Vec<u8>> {
        packet
            .data()
            .map(|d| d.to_vec())
            .ok_or_else(|| anyhow!("copy packet has no payload"))
    }
}
