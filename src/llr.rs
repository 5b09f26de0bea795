use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use thiserror::Error;

use crate::hash::HashAlgorithm;
use crate::refs::PacketReferences;

/// 'L' 'L' 'R' 0x00, packed big-endian.
pub const LLR_MAGIC: u32 = 0x4c4c_5200;

const LLR_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum LlrError {
    #[error("invalid LLR magic signature 0x{0:08x}")]
    BadMagic(u32),
    #[error("overlapping range at {orig_pos} (+{orig_size}), probably a bug")]
    OverlappingRange { orig_pos: u64, orig_size: u32 },
    #[error("unknown stream codec type {0}")]
    UnknownCodecType(u8),
    #[error("referenced range ends at {end} beyond file size {file_size}")]
    RangeOutOfBounds { end: u64, file_size: u64 },
    #[error("premature end of file")]
    PrematureEof,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Header fields parsed back from an LLR file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlrInfo {
    pub original_file_size: u64,
    pub hash_name: String,
    pub hash_buffer: Vec<u8>,
}

pub(crate) fn put_str<W: Write>(dest: &mut W, value: &str) -> Result<(), LlrError> {
    dest.write_all(value.as_bytes())?;
    dest.write_u8(0)?;
    Ok(())
}

pub(crate) fn get_str<R: Read>(source: &mut R) -> Result<String, LlrError> {
    let mut bytes = Vec::new();
    loop {
        let b = source.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    String::from_utf8(bytes)
        .map_err(|_| LlrError::Io(io::Error::new(io::ErrorKind::InvalidData, "non-UTF-8 string")))
}

/// Write the sidecar for `source`, consuming it front to back.
///
/// Gap bytes (not covered by any reference) are embedded after the tables;
/// referenced bytes are read and hashed but produce no output. The digest
/// therefore covers every source byte in ascending position, and is seeked
/// back into the reserved slot once the walk completes. Returns the digest.
pub fn write_llr<S, D>(
    source: &mut S,
    refs: &PacketReferences,
    dest: &mut D,
    algorithm: HashAlgorithm,
) -> Result<Vec<u8>, LlrError>
where
    S: Read + Seek,
    D: Write + Seek,
{
    let source_size = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;

    debug!("Writing LLR file:");
    dest.write_u32::<BigEndian>(LLR_MAGIC)?;
    dest.write_u64::<BigEndian>(source_size)?;
    put_str(dest, algorithm.name())?;
    dest.write_u16::<BigEndian>(algorithm.digest_len() as u16)?;

    // Reserve the hash slot; it is backfilled after the source walk.
    let hash_slot = dest.stream_position()?;
    dest.write_all(&vec![0u8; algorithm.digest_len()])?;

    refs.save(dest)?;

    let mut hasher = algorithm.hasher();
    let mut buffer = [0u8; LLR_BUFFER_SIZE];
    let mut prev_offset = 0u64;

    let mut consume =
        |source: &mut S, dest: Option<&mut D>, start: u64, end: u64| -> Result<(), LlrError> {
            let mut dest = dest;
            let mut pos = start;
            while pos != end {
                let want = ((end - pos) as usize).min(LLR_BUFFER_SIZE);
                let got = source.read(&mut buffer[..want])?;
                if got == 0 {
                    return Err(LlrError::PrematureEof);
                }
                hasher.update(&buffer[..got]);
                if let Some(dest) = dest.as_mut() {
                    dest.write_all(&buffer[..got])?;
                }
                pos += got as u64;
            }
            Ok(())
        };

    for (orig_pos, e) in refs.table() {
        let end = orig_pos + u64::from(e.orig_size);
        if end > source_size {
            return Err(LlrError::RangeOutOfBounds {
                end,
                file_size: source_size,
            });
        }

        if *orig_pos != prev_offset {
            debug!(
                "  {}-{}: Embedding - size {}",
                prev_offset,
                orig_pos,
                orig_pos - prev_offset
            );
            consume(&mut *source, Some(&mut *dest), prev_offset, *orig_pos)?;
        }

        debug!(
            "  {}-{}: Referencing stream #0:{} (index {}) - pts {} size {}",
            orig_pos, end, e.stream_index, e.packet_index, e.pts, e.orig_size
        );
        consume(&mut *source, None, *orig_pos, end)?;
        prev_offset = end;
    }

    if prev_offset != source_size {
        debug!(
            "  {}-{}: Embedding - size {}",
            prev_offset,
            source_size,
            source_size - prev_offset
        );
        consume(&mut *source, Some(&mut *dest), prev_offset, source_size)?;
    }

    let digest = hasher.finalize();
    let end_pos = dest.stream_position()?;
    dest.seek(SeekFrom::Start(hash_slot))?;
    dest.write_all(&digest)?;
    dest.seek(SeekFrom::Start(end_pos))?;

    Ok(digest)
}

/// Parse an LLR file and restore its embedded gap bytes into `out` at their
/// original offsets. Referenced ranges are left for the packet decoders.
pub fn read_llr<R, W>(llr: &mut R, out: &mut W) -> Result<(LlrInfo, PacketReferences), LlrError>
where
    R: Read,
    W: Write + Seek,
{
    let magic = llr.read_u32::<BigEndian>()?;
    if magic != LLR_MAGIC {
        return Err(LlrError::BadMagic(magic));
    }

    let original_file_size = llr.read_u64::<BigEndian>()?;
    let hash_name = get_str(llr)?;
    let hash_size = llr.read_u16::<BigEndian>()?;
    let mut hash_buffer = vec![0u8; hash_size as usize];
    llr.read_exact(&mut hash_buffer)?;

    let refs = PacketReferences::load(llr)?;

    let mut buffer = [0u8; LLR_BUFFER_SIZE];
    let mut restore = |llr: &mut R, out: &mut W, start: u64, end: u64| -> Result<(), LlrError> {
        debug!("  {}-{}: Restoring - size {}", start, end, end - start);
        out.seek(SeekFrom::Start(start))?;
        let mut pos = start;
        while pos != end {
            let want = ((end - pos) as usize).min(LLR_BUFFER_SIZE);
            let got = llr.read(&mut buffer[..want])?;
            if got == 0 {
                return Err(LlrError::PrematureEof);
            }
            out.write_all(&buffer[..got])?;
            pos += got as u64;
        }
        Ok(())
    };

    debug!("Reading LLR file:");
    let mut prev_offset = 0u64;
    for (orig_pos, e) in refs.table() {
        let end = orig_pos + u64::from(e.orig_size);
        if end > original_file_size {
            return Err(LlrError::RangeOutOfBounds {
                end,
                file_size: original_file_size,
            });
        }

        if *orig_pos != prev_offset {
            restore(&mut *llr, &mut *out, prev_offset, *orig_pos)?;
        }
        prev_offset = end;
    }

    if prev_offset != original_file_size {
        restore(&mut *llr, &mut *out, prev_offset, original_file_size)?;
    }

    Ok((
        LlrInfo {
            original_file_size,
            hash_name,
            hash_buffer,
        },
        refs,
    ))
}
