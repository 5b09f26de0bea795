use std::fs;
use std::process::Command;

#[test]
fn compress_rejects_non_mkv_output() {
    let exe = env!("CARGO_BIN_EXE_llrzip");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    fs::write(&input, b"data").unwrap();
    let output = dir.path().join("out.avi");

    let status = Command::new(exe)
        .args(["-q", "-i"])
        .arg(&input)
        .arg(&output)
        .status()
        .expect("run failed");
    assert!(!status.success());
}

#[test]
fn decompress_rejects_non_mkv_input() {
    let exe = env!("CARGO_BIN_EXE_llrzip");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.avi");
    fs::write(&input, b"data").unwrap();
    let output = dir.path().join("out.bin");

    let status = Command::new(exe)
        .args(["-q", "-d", "-i"])
        .arg(&input)
        .arg(&output)
        .status()
        .expect("run failed");
    assert!(!status.success());
}

#[test]
fn decompress_fails_without_sidecar() {
    let exe = env!("CARGO_BIN_EXE_llrzip");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.mkv");
    fs::write(&input, b"not a real container").unwrap();
    let output = dir.path().join("out.bin");

    let status = Command::new(exe)
        .args(["-q", "-d", "-i"])
        .arg(&input)
        .arg(&output)
        .status()
        .expect("run failed");
    assert!(!status.success());
}

#[test]
fn unknown_hash_name_is_rejected() {
    let exe = env!("CARGO_BIN_EXE_llrzip");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    fs::write(&input, b"data").unwrap();
    let output = dir.path().join("out.mkv");

    let status = Command::new(exe)
        .args(["-q", "--hash", "CRC16", "-i"])
        .arg(&input)
        .arg(&output)
        .status()
        .expect("run failed");
    assert!(!status.success());
}
