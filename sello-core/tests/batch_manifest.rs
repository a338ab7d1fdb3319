use std::path::Path;

use sello_core::batch::{RecordStatus, process_manifest};
use sello_core::{BatchConfig, Error, Identifier, SampleBuffer};

fn write_source(path: &Path, frames: usize) {
    let samples: Vec<i16> = (0..frames).map(|i| ((i * 131) % 6000) as i16 - 3000).collect();
    sello_core::wav::encode(&SampleBuffer::mono_i16(&samples, 16000), path).unwrap();
}

struct Fixture {
    _root: tempfile::TempDir,
    manifest: std::path::PathBuf,
    config: BatchConfig,
}

fn fixture(manifest_body: &str) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let real = root.path().join("Data").join("REAL");
    let fake = root.path().join("Data").join("FAKE");
    std::fs::create_dir_all(&real).unwrap();
    std::fs::create_dir_all(&fake).unwrap();

    write_source(&real.join("alice.wav"), 2000);
    write_source(&fake.join("bob.wav"), 2000);
    write_source(&fake.join("tiny.wav"), 4);

    let manifest = root.path().join("records.csv");
    std::fs::write(&manifest, manifest_body).unwrap();

    let config = BatchConfig::new(real, fake, root.path().join("watermarked_files"));
    Fixture {
        _root: root,
        manifest,
        config,
    }
}

#[test]
fn processes_rows_and_rewrites_manifest() {
    let fx = fixture(
        "unique_hex_code,audio_file_name,label,speaker\n\
         00ab12cd,alice.wav,real,Alice\n\
         ffee0011,bob.wav,fake,Bob\n\
         1234,carol.wav,synthetic,Carol\n\
         5678,dave.wav,real,Dave\n\
         9abc,tiny.wav,fake,Tiny\n",
    );

    let summary = process_manifest(&fx.manifest, &fx.config, None).unwrap();
    assert_eq!(summary.records.len(), 5);
    assert_eq!(summary.watermarked(), 2);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.missing(), 1);
    assert_eq!(summary.failed(), 1);

    let alice_out = fx.config.output_dir.join("alice_watermarked.wav");
    assert_eq!(summary.records[0].status.output(), Some(alice_out.as_path()));
    let buffer = sello_core::wav::decode(&alice_out).unwrap();
    assert_eq!(
        sello_core::extract(&buffer, 8).unwrap().identifier,
        Identifier::parse("00ab12cd").unwrap()
    );

    let mut reader = csv::Reader::from_path(&fx.manifest).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["unique_hex_code", "audio_file_name", "label", "speaker", "watermarked_file_path"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[0][3], "Alice");
    assert_eq!(&rows[0][4], alice_out.to_string_lossy());
    assert!(rows[1][4].ends_with("bob_watermarked.wav"));
    assert_eq!(&rows[2][4], "");
    assert_eq!(&rows[3][4], "");
    assert_eq!(&rows[4][4], "");
}

#[test]
fn rerun_replaces_existing_output_column() {
    let fx = fixture(
        "unique_hex_code,audio_file_name,label\n\
         cafe,alice.wav,real\n",
    );
    process_manifest(&fx.manifest, &fx.config, None).unwrap();
    process_manifest(&fx.manifest, &fx.config, None).unwrap();

    let mut reader = csv::Reader::from_path(&fx.manifest).unwrap();
    assert_eq!(reader.headers().unwrap().len(), 4);
    let row = reader.records().next().unwrap().unwrap();
    assert!(row[3].ends_with("alice_watermarked.wav"));
}

#[test]
fn invalid_identifier_fails_only_its_row() {
    let fx = fixture(
        "unique_hex_code,audio_file_name,label\n\
         not-hex,alice.wav,real\n\
         beef,bob.wav,fake\n",
    );
    let summary = process_manifest(&fx.manifest, &fx.config, None).unwrap();
    assert!(matches!(summary.records[0].status, RecordStatus::Failed { .. }));
    assert!(matches!(summary.records[1].status, RecordStatus::Watermarked { .. }));
}

#[test]
fn missing_column_is_rejected() {
    let fx = fixture("audio_file_name,label\nalice.wav,real\n");
    assert!(matches!(
        process_manifest(&fx.manifest, &fx.config, None),
        Err(Error::MissingColumn("unique_hex_code"))
    ));
}

#[test]
fn same_stem_in_both_folders_keeps_first_row() {
    let fx = fixture(
        "unique_hex_code,audio_file_name,label\n\
         aaaa,alice.wav,real\n\
         5555,alice.wav,fake\n",
    );
    write_source(&fx.config.fake_dir.join("alice.wav"), 2000);

    let summary = process_manifest(&fx.manifest, &fx.config, None).unwrap();
    assert_eq!(summary.watermarked(), 1);
    assert!(matches!(
        summary.records[1].status,
        RecordStatus::Failed { ref reason } if reason.contains("row 0")
    ));

    let alice_out = fx.config.output_dir.join("alice_watermarked.wav");
    assert_eq!(summary.records[0].status.output(), Some(alice_out.as_path()));
    let buffer = sello_core::wav::decode(&alice_out).unwrap();
    assert_eq!(sello_core::extract(&buffer, 4).unwrap().identifier.as_str(), "aaaa");

    let mut reader = csv::Reader::from_path(&fx.manifest).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(&rows[0][3], alice_out.to_string_lossy());
    assert_eq!(&rows[1][3], "");
}
