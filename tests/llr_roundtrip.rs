use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use llrzip::hash::{hash_file, HashAlgorithm};
use llrzip::llr::{read_llr, write_llr, LlrError};
use llrzip::refs::PacketReferences;

fn write_original(dir: &Path, len: usize) -> PathBuf {
    let path = dir.join("original.bin");
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 253) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

/// Stand-in for the packet decoders: referenced ranges resolve to the very
/// bytes of the original file.
fn restore_referenced_ranges(original: &Path, out: &mut File, refs: &PacketReferences) {
    let mut source = File::open(original).unwrap();
    for (orig_pos, e) in refs.table() {
        let mut buf = vec![0u8; e.orig_size as usize];
        source.seek(SeekFrom::Start(*orig_pos)).unwrap();
        source.read_exact(&mut buf).unwrap();
        out.seek(SeekFrom::Start(*orig_pos)).unwrap();
        out.write_all(&buf).unwrap();
    }
}

fn reconstruct(dir: &Path, original: &Path, llr_path: &Path) -> PathBuf {
    let restored_path = dir.join("restored.bin");
    let mut llr_file = File::open(llr_path).unwrap();
    let mut restored = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&restored_path)
        .unwrap();

    let (info, refs) = read_llr(&mut llr_file, &mut restored).unwrap();
    restored.set_len(info.original_file_size).unwrap();
    restore_referenced_ranges(original, &mut restored, &refs);

    let recomputed = hash_file(
        &restored_path,
        HashAlgorithm::from_name(&info.hash_name).unwrap(),
    )
    .unwrap();
    assert_eq!(recomputed, info.hash_buffer, "reconstructed hash mismatch");

    restored_path
}

#[test]
fn sidecar_round_trip_restores_every_byte() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_original(dir.path(), 20_000);

    let mut refs = PacketReferences::new();
    refs.add_video_stream("yuv422p");
    refs.add_copy_stream();
    // A header gap, two video packets, an audio packet, a trailing gap.
    refs.add_packet_reference(0, 0, 0, 16, 6000).unwrap();
    refs.add_packet_reference(0, 1, 40, 6016, 6000).unwrap();
    refs.add_packet_reference(1, 0, 0, 12_500, 2000).unwrap();

    let llr_path = dir.path().join("original.llr");
    let mut source = File::open(&original).unwrap();
    let mut llr_file = File::create(&llr_path).unwrap();
    let digest = write_llr(&mut source, &refs, &mut llr_file, HashAlgorithm::Md5).unwrap();
    drop(llr_file);

    assert_eq!(hash_file(&original, HashAlgorithm::Md5).unwrap(), digest);

    let restored = reconstruct(dir.path(), &original, &llr_path);
    assert_eq!(
        std::fs::read(&restored).unwrap(),
        std::fs::read(&original).unwrap()
    );
}

#[test]
fn empty_original_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("empty.bin");
    std::fs::write(&original, b"").unwrap();

    let refs = PacketReferences::new();
    let llr_path = dir.path().join("empty.llr");
    let mut source = File::open(&original).unwrap();
    let mut llr_file = File::create(&llr_path).unwrap();
    write_llr(&mut source, &refs, &mut llr_file, HashAlgorithm::Md5).unwrap();
    drop(llr_file);

    let restored = reconstruct(dir.path(), &original, &llr_path);
    assert_eq!(std::fs::read(&restored).unwrap().len(), 0);
}

#[test]
fn sha256_selection_is_recorded_in_header() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_original(dir.path(), 500);

    let refs = PacketReferences::new();
    let llr_path = dir.path().join("original.llr");
    let mut source = File::open(&original).unwrap();
    let mut llr_file = File::create(&llr_path).unwrap();
    write_llr(&mut source, &refs, &mut llr_file, HashAlgorithm::Sha256).unwrap();
    drop(llr_file);

    let mut llr_file = File::open(&llr_path).unwrap();
    let mut sink = std::io::Cursor::new(Vec::new());
    let (info, _) = read_llr(&mut llr_file, &mut sink).unwrap();
    assert_eq!(info.hash_name, "SHA256");
    assert_eq!(info.hash_buffer.len(), 32);
    assert_eq!(
        info.hash_buffer,
        hash_file(&original, HashAlgorithm::Sha256).unwrap()
    );
}

#[test]
fn tampered_reconstruction_fails_hash_verification() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_original(dir.path(), 4000);

    let mut refs = PacketReferences::new();
    refs.add_video_stream("yuv420p");
    refs.add_packet_reference(0, 0, 0, 0, 2000).unwrap();

    let llr_path = dir.path().join("original.llr");
    let mut source = File::open(&original).unwrap();
    let mut llr_file = File::create(&llr_path).unwrap();
    write_llr(&mut source, &refs, &mut llr_file, HashAlgorithm::Md5).unwrap();
    drop(llr_file);

    let restored_path = dir.path().join("restored.bin");
    let mut llr_file = File::open(&llr_path).unwrap();
    let mut restored = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&restored_path)
        .unwrap();
    let (info, refs) = read_llr(&mut llr_file, &mut restored).unwrap();
    restored.set_len(info.original_file_size).unwrap();
    restore_referenced_ranges(&original, &mut restored, &refs);

    // One flipped byte inside the referenced range.
    restored.seek(SeekFrom::Start(1000)).unwrap();
    let mut b = [0u8; 1];
    restored.read_exact(&mut b).unwrap();
    restored.seek(SeekFrom::Start(1000)).unwrap();
    restored.write_all(&[b[0] ^ 0xff]).unwrap();
    drop(restored);

    let recomputed = hash_file(&restored_path, HashAlgorithm::Md5).unwrap();
    assert_ne!(recomputed, info.hash_buffer);
}

#[test]
fn truncated_sidecar_is_rejected_before_output_is_produced() {
    let dir = tempfile::tempdir().unwrap();
    let original = write_original(dir.path(), 1000);

    let refs = PacketReferences::new();
    let llr_path = dir.path().join("original.llr");
    let mut source = File::open(&original).unwrap();
    let mut llr_file = File::create(&llr_path).unwrap();
    write_llr(&mut source, &refs, &mut llr_file, HashAlgorithm::Md5).unwrap();
    drop(llr_file);

    // Cut one byte out of the hash slot region.
    let full = std::fs::read(&llr_path).unwrap();
    let truncated_path = dir.path().join("truncated.llr");
    std::fs::write(&truncated_path, &full[..4 + 8 + 4 + 2 + 15]).unwrap();

    let mut llr_file = File::open(&truncated_path).unwrap();
    let mut sink = std::io::Cursor::new(Vec::new());
    let err = read_llr(&mut llr_file, &mut sink).unwrap_err();
    assert!(matches!(err, LlrError::Io(_)));
    assert!(sink.get_ref().is_empty());
}
