//! CLI test cases.
//!
//! Tests that rasterize or read PDF text need `pdfinfo`, `pdftotext` and
//! `pdftocairo` on the `PATH`, so they are ignored by default. Run them with
//! `cargo test -- --ignored`.

use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("label-splitter").unwrap();
    cmd.env_remove("LABEL_SPLITTER_BASE_DIR");
    cmd
}

/// A one-page US letter PDF with a dark block in the first label row and
/// `lines` of Helvetica text below it.
fn label_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("0 g 30 680 552 90 re f\nBT /F1 12 Tf 14 TL 40 640 Td\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", line));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_owned(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_owned(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_owned(),
        format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_owned(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = vec![];
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }
    let xref_offset = pdf.len();
    pdf.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
    );
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

fn write_pdf(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("labels.pdf");
    fs::write(&path, label_pdf(lines)).unwrap();
    path
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("LABEL_SPLITTER_BASE_DIR"));
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg("split")
        .arg(dir.path().join("missing.pdf"))
        .arg("--base-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("input file not found"));
    assert!(!dir.path().join("etiquetas").exists());
}

#[test]
fn test_non_pdf_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.pdf");
    fs::write(&path, "just some text").unwrap();
    cmd()
        .arg("split")
        .arg(&path)
        .arg("--base-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read PDF"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), &["Venta: S1"]);
    cmd()
        .arg("split")
        .arg(&path)
        .arg("--base-dir")
        .arg(dir.path())
        .arg("--jpeg-quality")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_schema_run_event() {
    cmd()
        .arg("schema")
        .arg("RunEvent")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completed\""));
}

#[test]
fn test_schema_profile_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.schema.json");
    cmd()
        .arg("schema")
        .arg("Profile")
        .arg("--out")
        .arg(&path)
        .assert()
        .success();
    let schema = fs::read_to_string(&path).unwrap();
    assert!(schema.contains("trim_threshold"));
}

#[test]
#[ignore = "Requires poppler-utils to be installed"]
fn test_split_undated_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), &["Venta: S00123"]);
    cmd()
        .arg("split")
        .arg(&path)
        .env("LABEL_SPLITTER_BASE_DIR", dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 label(s) written"));
    let label = dir.path().join("etiquetas/sin_fecha/S00123.jpg");
    // The default canvas is 6 x 4 inches at 200 DPI.
    assert_eq!(image::image_dimensions(&label).unwrap(), (1200, 800));
}

#[test]
#[ignore = "Requires poppler-utils to be installed"]
fn test_split_dated_pdf_with_repeats_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), &["Fecha: 21/1/2026", "Venta: S77700", "Venta: S77700"]);
    let events = dir.path().join("events.jsonl");
    cmd()
        .arg("split")
        .arg(&path)
        .arg("--base-dir")
        .arg(dir.path())
        .arg("--profile")
        .arg("vector")
        .arg("--events")
        .arg(&events)
        .assert()
        .success();

    let out = dir.path().join("etiquetas/2026-01-21");
    assert!(out.join("S77700.jpg").is_file());
    assert!(out.join("S77700_2.jpg").is_file());

    let events = fs::read_to_string(&events).unwrap();
    let last = events.lines().last().unwrap();
    let last: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["count"], 2);
}

#[test]
#[ignore = "Requires poppler-utils to be installed"]
fn test_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), &["Fecha: 3/11/2025", "Venta: S42"]);
    cmd()
        .arg("info")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-11-03"))
        .stdout(predicate::str::contains("S42"));
}

