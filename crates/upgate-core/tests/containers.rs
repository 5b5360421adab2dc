//! Compression-ratio and signature verdicts for each container format, read from disk.

#![allow(clippy::unwrap_used)]

mod common;

use std::path::Path;

use common::gzip_bytes;
use common::noise;
use common::sevenz_bytes;
use common::tar_bytes;
use common::validator;
use common::write_file;
use common::zip_bytes;
use tempfile::TempDir;
use upgate_core::RiskLevel;
use upgate_core::Tier;
use upgate_core::ValidationMode;
use upgate_core::ValidationReport;

const FOUR_MIB: usize = 4 * 1024 * 1024;

fn check(path: &Path) -> ValidationReport {
    validator(Tier::Basic, ValidationMode::Detailed)
        .validate(path, None)
        .unwrap()
}

fn assert_bomb(report: &ValidationReport) {
    assert!(!report.is_safe, "{} should be rejected", report.filename);
    let archive = &report.checks["archive_contents"];
    assert!(!archive.passed);
    assert!(archive.message.contains("zip bomb"), "{}", archive.message);
    assert_eq!(report.risk_level, RiskLevel::High);
}

fn assert_clean(report: &ValidationReport) {
    assert!(report.is_safe, "{}: {:?}", report.filename, report.errors);
    assert!(report.checks["archive_contents"].passed);
}

#[test]
fn test_zip_of_zeros_rejected() {
    let temp = TempDir::new().unwrap();
    let zeros = vec![0u8; FOUR_MIB];
    let path = write_file(temp.path(), "zeros.zip", &zip_bytes(&[("zeros.csv", &zeros)]));
    assert_bomb(&check(&path));
}

#[test]
fn test_zip_of_noise_accepted() {
    let temp = TempDir::new().unwrap();
    let data = noise(256 * 1024);
    let path = write_file(temp.path(), "noise.zip", &zip_bytes(&[("noise.dat", &data)]));
    assert_clean(&check(&path));
}

#[test]
fn test_tar_gz_of_zeros_rejected() {
    let temp = TempDir::new().unwrap();
    let zeros = vec![0u8; FOUR_MIB];
    let bytes = gzip_bytes(&tar_bytes(&[("zeros.csv", &zeros)]));
    let path = write_file(temp.path(), "bundle.tar.gz", &bytes);

    let report = check(&path);
    assert_bomb(&report);
    assert!(report.checks["archive_contents"].message.contains("bundle.tar.gz"));
}

#[test]
fn test_tar_gz_of_noise_accepted() {
    let temp = TempDir::new().unwrap();
    let data = noise(256 * 1024);
    let bytes = gzip_bytes(&tar_bytes(&[("noise.dat", &data)]));
    let path = write_file(temp.path(), "bundle.tgz", &bytes);

    let report = check(&path);
    assert_clean(&report);
    assert_eq!(report.archive.unwrap().entry_count, 1);
}

#[test]
fn test_bare_gzip_of_zeros_rejected() {
    let temp = TempDir::new().unwrap();
    let zeros = vec![0u8; FOUR_MIB];
    let path = write_file(temp.path(), "readings.csv.gz", &gzip_bytes(&zeros));

    let report = check(&path);
    assert_bomb(&report);
    assert!(report.checks["archive_contents"].message.contains("readings.csv"));
}

#[test]
fn test_bare_gzip_of_noise_accepted() {
    let temp = TempDir::new().unwrap();
    let path = write_file(temp.path(), "readings.csv.gz", &gzip_bytes(&noise(256 * 1024)));

    let report = check(&path);
    assert_clean(&report);
    assert_eq!(report.archive.unwrap().total_declared_size, 256 * 1024);
}

#[test]
fn test_sevenz_of_zeros_rejected() {
    let temp = TempDir::new().unwrap();
    let zeros = vec![0u8; FOUR_MIB];
    let path = write_file(temp.path(), "zeros.7z", &sevenz_bytes(&[("zeros.csv", &zeros)]));
    assert_bomb(&check(&path));
}

#[test]
fn test_sevenz_of_noise_accepted() {
    let temp = TempDir::new().unwrap();
    let data = noise(256 * 1024);
    let path = write_file(temp.path(), "noise.7z", &sevenz_bytes(&[("noise.dat", &data)]));
    assert_clean(&check(&path));
}

#[test]
fn test_tar_members_named_like_other_signatures() {
    let temp = TempDir::new().unwrap();
    for first in ["MZ.txt", "BM.txt", "ID3.txt"] {
        let bytes = tar_bytes(&[(first, b"plain text\n"), ("notes.txt", b"more\n")]);
        let path = write_file(temp.path(), &format!("{first}.tar"), &bytes);

        let report = check(&path);
        assert_clean(&report);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.archive.unwrap().entry_count, 2);
    }
}
