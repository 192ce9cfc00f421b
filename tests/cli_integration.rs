use std::process::Command;
use tempfile::tempdir;

use rvl_codec::rvl::{self, ClipPlanes, CodecOptions, DepthFrame};

fn bin() -> String {
    env!("CARGO_BIN_EXE_rvl").to_string()
}

fn sample_frame() -> DepthFrame {
    let pixels = (0..12 * 8u32)
        .map(|i| if i % 4 == 0 { 0 } else { 4000 + (i as u16) * 11 })
        .collect();
    DepthFrame::new(12, 8, pixels)
        .unwrap()
        .with_clip_planes(Some(ClipPlanes::new(0.1, 100.0).unwrap()))
}

#[test]
fn cli_encode_decode_raw_roundtrip() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("frame.raw");
    let encoded = dir.path().join("frame.rvl");
    let output = dir.path().join("out.raw");

    let frame = sample_frame();
    std::fs::write(&raw, frame.to_le_bytes()).unwrap();

    let st = Command::new(bin())
        .args(["encode", "--width", "12", "--height", "8", "--near", "0.1", "--far", "100"])
        .arg(&raw)
        .arg(&encoded)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(
        rvl::decode(&std::fs::read(&encoded).unwrap()).unwrap(),
        frame
    );

    let st = Command::new(bin())
        .args(["decode", "--format", "raw"])
        .arg(&encoded)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), frame.to_le_bytes());
}

#[test]
fn cli_pgm_roundtrip_through_legacy_format() {
    let dir = tempdir().unwrap();
    let encoded = dir.path().join("legacy.rvl");
    let pgm = dir.path().join("frame.pgm");
    let reencoded = dir.path().join("again.rvl");

    let frame = sample_frame();
    std::fs::write(&encoded, rvl::encode_with(&frame, &CodecOptions::legacy()).unwrap()).unwrap();

    let st = Command::new(bin())
        .args(["decode", "--legacy"])
        .arg(&encoded)
        .arg(&pgm)
        .status()
        .unwrap();
    assert!(st.success());
    let pgm_bytes = std::fs::read(&pgm).unwrap();
    assert!(pgm_bytes.starts_with(b"P5\n12 8\n65535\n"));

    let st = Command::new(bin())
        .args(["encode", "--header", "textual", "--legacy"])
        .arg(&pgm)
        .arg(&reencoded)
        .status()
        .unwrap();
    assert!(st.success());
    let again = rvl::decode_with(&std::fs::read(&reencoded).unwrap(), &CodecOptions::legacy())
        .unwrap()
        .frame;
    assert_eq!(again.pixels(), frame.pixels());
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let encoded = dir.path().join("frame.rvl");
    let output = dir.path().join("exists.pgm");
    std::fs::write(&encoded, rvl::encode(&sample_frame())).unwrap();
    std::fs::write(&output, b"keep me").unwrap();

    let st = Command::new(bin())
        .arg("decode")
        .arg(&encoded)
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let st = Command::new(bin())
        .arg("--force")
        .arg("decode")
        .arg(&encoded)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_linearize_needs_clip_planes() {
    let dir = tempdir().unwrap();
    let encoded = dir.path().join("noclip.rvl");
    let output = dir.path().join("out.pgm");
    let frame = sample_frame().with_clip_planes(None);
    std::fs::write(&encoded, rvl::encode(&frame)).unwrap();

    let out = Command::new(bin())
        .args(["decode", "--linearize"])
        .arg(&encoded)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("clip planes"));
}

#[test]
fn cli_info_reports_header() {
    let dir = tempdir().unwrap();
    let encoded = dir.path().join("frame.rvl");
    std::fs::write(&encoded, rvl::encode(&sample_frame())).unwrap();

    let out = Command::new(bin()).arg("info").arg(&encoded).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("12x8"));
    assert!(stdout.contains("binary"));

    let out = Command::new(bin())
        .args(["--json", "--quiet", "info"])
        .arg(&encoded)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["width"], 12);
    assert_eq!(json["height"], 8);
    assert_eq!(json["header"], "binary");
}

#[test]
fn cli_rejects_bad_magic() {
    let dir = tempdir().unwrap();
    let bogus = dir.path().join("bogus.rvl");
    std::fs::write(&bogus, b"PNG\n\0\0\0\0").unwrap();

    let out = Command::new(bin()).arg("info").arg(&bogus).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("bad magic"));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
}
