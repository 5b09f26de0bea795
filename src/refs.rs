use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::llr::{get_str, put_str, LlrError};

pub const CODEC_TYPE_COPY: u8 = 1;
pub const CODEC_TYPE_VIDEO: u8 = 2;

/// Per-stream row of the sidecar stream table. A `Video` row records the
/// pixel format the original raw stream carried, which the decompression
/// pass must restore exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamInfo {
    Copy,
    Video { pixel_format: String },
}

impl StreamInfo {
    fn type_byte(&self) -> u8 {
        match self {
            StreamInfo::Copy => CODEC_TYPE_COPY,
            StreamInfo::Video { .. } => CODEC_TYPE_VIDEO,
        }
    }
}

/// One encoded packet standing in for a byte range of the original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub orig_size: u32,
    pub stream_index: u32,
    pub packet_index: u64,
    pub pts: i64,
}

/// Mapping between original-file byte ranges and packets of the compressed
/// container. Keys are original-file positions; iteration is always in
/// ascending position order and ranges never overlap.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketReferences {
    streams: Vec<StreamInfo>,
    table: BTreeMap<u64, ReferenceInfo>,
}

impl PacketReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video_stream(&mut self, pixel_format: &str) {
        self.streams.push(StreamInfo::Video {
            pixel_format: pixel_format.to_string(),
        });
    }

    pub fn add_copy_stream(&mut self) {
        self.streams.push(StreamInfo::Copy);
    }

    pub fn add_packet_reference(
        &mut self,
        stream_index: u32,
        packet_index: u64,
        pts: i64,
        orig_pos: u64,
        orig_size: u32,
    ) -> Result<(), LlrError> {
        let overlap = LlrError::OverlappingRange {
            orig_pos,
            orig_size,
        };

        if let Some((prev_pos, prev)) = self.table.range(..=orig_pos).next_back() {
            if *prev_pos == orig_pos || prev_pos + u64::from(prev.orig_size) > orig_pos {
                return Err(overlap);
            }
        }
        if let Some((next_pos, _)) = self.table.range(orig_pos..).next() {
            if orig_pos + u64::from(orig_size) > *next_pos {
                return Err(overlap);
            }
        }

        self.table.insert(
            orig_pos,
            ReferenceInfo {
                orig_size,
                stream_index,
                packet_index,
                pts,
            },
        );
        Ok(())
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    pub fn table(&self) -> &BTreeMap<u64, ReferenceInfo> {
        &self.table
    }

    pub fn dump(&self) {
        debug!("Packet references (total {}):", self.table.len());
        for (orig_pos, e) in &self.table {
            debug!(
                "  {}-{}: Stream #0:{} (index {}) - pts {} size {}",
                orig_pos,
                orig_pos + u64::from(e.orig_size),
                e.stream_index,
                e.packet_index,
                e.pts,
                e.orig_size
            );
        }
    }

    /// Serialize the stream table followed by the reference table.
    pub fn save<W: Write>(&self, dest: &mut W) -> Result<(), LlrError> {
        dest.write_u32::<BigEndian>(self.streams.len() as u32)?;
        for stream in &self.streams {
            dest.write_u8(stream.type_byte())?;
            if let StreamInfo::Video { pixel_format } = stream {
                put_str(dest, pixel_format)?;
            }
        }

        dest.write_u64::<BigEndian>(self.table.len() as u64)?;
        for (orig_pos, e) in &self.table {
            dest.write_u64::<BigEndian>(*orig_pos)?;
            dest.write_u32::<BigEndian>(e.orig_size)?;
            dest.write_u32::<BigEndian>(e.stream_index)?;
            dest.write_u64::<BigEndian>(e.packet_index)?;
            dest.write_i64::<BigEndian>(e.pts)?;
        }

        Ok(())
    }

    pub fn load<R: Read>(source: &mut R) -> Result<Self, LlrError> {
        let mut refs = PacketReferences::new();

        let stream_count = source.read_u32::<BigEndian>()?;
        for _ in 0..stream_count {
            match source.read_u8()? {
                CODEC_TYPE_COPY => refs.add_copy_stream(),
                CODEC_TYPE_VIDEO => {
                    let pixel_format = get_str(source)?;
                    refs.add_video_stream(&pixel_format);
                }
                other => return Err(LlrError::UnknownCodecType(other)),
            }
        }

        let table_count = source.read_u64::<BigEndian>()?;
        for _ in 0..table_count {
            let orig_pos = source.read_u64::<BigEndian>()?;
            let orig_size = source.read_u32::<BigEndian>()?;
            let stream_index = source.read_u32::<BigEndian>()?;
            let packet_index = source.read_u64::<BigEndian>()?;
            let pts = source.read_i64::<BigEndian>()?;

            refs.add_packet_reference(stream_index, packet_index, pts, orig_pos, orig_size)?;
        }

        Ok(refs)
    }
}
