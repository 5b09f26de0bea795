use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256, Sha512};

const HASH_READ_BUFFER: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
    Sha512,
    Crc32,
}

impl HashAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("MD5") {
            Some(HashAlgorithm::Md5)
        } else if name.eq_ignore_ascii_case("SHA256") {
            Some(HashAlgorithm::Sha256)
        } else if name.eq_ignore_ascii_case("SHA512") {
            Some(HashAlgorithm::Sha512)
        } else if name.eq_ignore_ascii_case("CRC32") {
            Some(HashAlgorithm::Crc32)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
            HashAlgorithm::Crc32 => "CRC32",
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["MD5", "SHA256", "SHA512", "CRC32"]
    }

    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Crc32 => 4,
        }
    }

    pub fn hasher(self) -> Hasher {
        match self {
            HashAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
            HashAlgorithm::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
        }
    }
}

/// Incremental hash context. The digest covers exactly the bytes passed to
/// `update`, in order.
pub enum Hasher {
    Md5(md5::Context),
    Sha256(Sha256),
    Sha512(Sha512),
    Crc32(crc32fast::Hasher),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha256(ctx) => ctx.update(data),
            Hasher::Sha512(ctx) => ctx.update(data),
            Hasher::Crc32(ctx) => ctx.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Md5(ctx) => ctx.compute().0.to_vec(),
            Hasher::Sha256(ctx) => ctx.finalize().to_vec(),
            Hasher::Sha512(ctx) => ctx.finalize().to_vec(),
            Hasher::Crc32(ctx) => ctx.finalize().to_be_bytes().to_vec(),
        }
    }
}

/// Hash a whole file front to back with bounded reads.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
    let mut file =
        File::open(path).with_context(|| format!("open file for hashing {}", path.display()))?;

    let mut hasher = algorithm.hasher();
    let mut buffer = [0u8; HASH_READ_BUFFER];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

pub fn format_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
