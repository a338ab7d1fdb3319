//! Manifest-driven batch embedding.
//!
//! A CSV manifest lists one file per row with at least the columns
//! `unique_hex_code`, `audio_file_name` and `label`. Rows labelled `real` or
//! `fake` are read from the matching source folder, watermarked with their
//! identifier and written to `<output_dir>/<stem>_watermarked.wav`. The
//! manifest is rewritten with a `watermarked_file_path` column, left empty
//! for rows that were not processed.
//!
//! Output names are planned before any file is written. When two rows map to
//! the same output (`REAL/x.wav` and `FAKE/x.wav`, or `x.mp3` and `x.wav`),
//! the first row keeps it and later rows fail.
//!
//! With the `parallel` feature rows are processed on the rayon pool; each
//! task owns its buffer and output order matches manifest order.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::config::BatchConfig;
use crate::embed::embed;
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::transcode::FfmpegTranscoder;
use crate::wav;

pub const HEX_COLUMN: &str = "unique_hex_code";
pub const FILE_COLUMN: &str = "audio_file_name";
pub const LABEL_COLUMN: &str = "label";
pub const OUTPUT_COLUMN: &str = "watermarked_file_path";

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRow {
    pub unique_hex_code: String,
    pub audio_file_name: String,
    pub label: String,
}

/// What happened to a single manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Watermarked {
        output: PathBuf,
        embedded_bits: usize,
        partial: bool,
    },
    /// Label other than `real`/`fake`.
    Skipped { label: String },
    /// Source file not found in the label's folder.
    Missing { path: PathBuf },
    Failed { reason: String },
}

impl RecordStatus {
    pub fn output(&self) -> Option<&Path> {
        match self {
            RecordStatus::Watermarked { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRecord {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    pub identifier: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub records: Vec<BatchRecord>,
}

impl BatchSummary {
    pub fn watermarked(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Watermarked { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Skipped { .. }))
    }

    pub fn missing(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Missing { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RecordStatus) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Watermark every row of `manifest` and rewrite it with output paths.
///
/// `converter`, when given, is used for sources that are not `.wav`. A row
/// that fails never aborts the batch; only manifest-level problems (unreadable
/// file, missing columns, failed rewrite) are returned as errors.
pub fn process_manifest(
    manifest: &Path,
    config: &BatchConfig,
    converter: Option<&FfmpegTranscoder>,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(manifest)?;
    let headers = reader.headers()?.clone();
    for column in [HEX_COLUMN, FILE_COLUMN, LABEL_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn(column));
        }
    }
    let raw: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    std::fs::create_dir_all(&config.output_dir)?;
    tracing::info!(
        manifest = %manifest.display(),
        rows = raw.len(),
        output_dir = %config.output_dir.display(),
        "starting batch"
    );

    let parsed: Vec<std::result::Result<ManifestRow, String>> = raw
        .iter()
        .map(|record| record.deserialize(Some(&headers)).map_err(|e| e.to_string()))
        .collect();
    let collisions = output_collisions(&parsed, config);

    let process = |row: usize| -> BatchRecord {
        match (&parsed[row], collisions[row]) {
            (Ok(entry), None) => BatchRecord {
                row,
                identifier: entry.unique_hex_code.clone(),
                status: process_row(entry, config, converter),
            },
            (Ok(entry), Some(first)) => {
                tracing::warn!(
                    row,
                    first,
                    file = %entry.audio_file_name,
                    "output name already taken, skipping"
                );
                BatchRecord {
                    row,
                    identifier: entry.unique_hex_code.clone(),
                    status: RecordStatus::Failed {
                        reason: format!("output collides with row {first}"),
                    },
                }
            }
            (Err(e), _) => BatchRecord {
                row,
                identifier: String::new(),
                status: RecordStatus::Failed { reason: e.clone() },
            },
        }
    };

    #[cfg(feature = "parallel")]
    let records: Vec<BatchRecord> = (0..raw.len()).into_par_iter().map(process).collect();
    #[cfg(not(feature = "parallel"))]
    let records: Vec<BatchRecord> = (0..raw.len()).map(process).collect();

    rewrite_manifest(manifest, &headers, &raw, &records)?;

    let summary = BatchSummary { records };
    tracing::info!(
        watermarked = summary.watermarked(),
        skipped = summary.skipped(),
        missing = summary.missing(),
        failed = summary.failed(),
        "batch finished"
    );
    Ok(summary)
}

/// Watermark the file named by a single manifest row.
pub fn process_row(
    row: &ManifestRow,
    config: &BatchConfig,
    converter: Option<&FfmpegTranscoder>,
) -> RecordStatus {
    let Some(source) = source_path(row, config) else {
        let label = row.label.trim();
        tracing::warn!(file = %row.audio_file_name, label, "unknown label, skipping");
        return RecordStatus::Skipped {
            label: label.to_string(),
        };
    };

    if !source.is_file() {
        tracing::warn!(path = %source.display(), "source file not found");
        return RecordStatus::Missing { path: source };
    }

    match watermark_file(&source, &row.unique_hex_code, config, converter) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(path = %source.display(), error = %e, "failed to watermark");
            RecordStatus::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn watermark_file(
    source: &Path,
    hex: &str,
    config: &BatchConfig,
    converter: Option<&FfmpegTranscoder>,
) -> Result<RecordStatus> {
    let id = Identifier::parse(hex)?;

    let is_wav = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let buffer = match (is_wav, converter) {
        (true, _) => wav::decode(source)?,
        (false, Some(converter)) => {
            let dir = tempfile::tempdir()?;
            let converted = dir.path().join("converted.wav");
            converter.convert_to_pcm(source, &converted)?;
            wav::decode(&converted)?
        }
        (false, None) => {
            return Err(Error::UnsupportedFormat(format!(
                "{} is not WAV and no converter is configured",
                source.display()
            )));
        }
    };

    let mut result = embed(&buffer, &id.to_bits(), &config.embed)?;
    if !config.allow_partial {
        result = result.require_complete()?;
    }

    let output = output_path(source, config);
    wav::encode(&result.buffer, &output)?;

    tracing::info!(
        identifier = %id,
        output = %output.display(),
        bits = result.embedded_bits,
        "watermarked"
    );
    Ok(RecordStatus::Watermarked {
        output,
        embedded_bits: result.embedded_bits,
        partial: result.is_partial(),
    })
}

/// Source file for a row, or `None` when the label is neither `real` nor `fake`.
fn source_path(row: &ManifestRow, config: &BatchConfig) -> Option<PathBuf> {
    let folder = match row.label.trim() {
        "real" => &config.real_dir,
        "fake" => &config.fake_dir,
        _ => return None,
    };
    Some(folder.join(&row.audio_file_name))
}

fn output_path(source: &Path, config: &BatchConfig) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    config.output_dir.join(format!("{stem}_watermarked.wav"))
}

/// For each row, the index of an earlier row that already claims the same
/// output file. Only rows whose source exists claim a name.
fn output_collisions(
    rows: &[std::result::Result<ManifestRow, String>],
    config: &BatchConfig,
) -> Vec<Option<usize>> {
    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let source = source_path(row.as_ref().ok()?, config)?;
            if !source.is_file() {
                return None;
            }
            match claimed.entry(output_path(&source, config)) {
                Entry::Occupied(first) => Some(*first.get()),
                Entry::Vacant(slot) => {
                    slot.insert(index);
                    None
                }
            }
        })
        .collect()
}

fn rewrite_manifest(
    manifest: &Path,
    headers: &csv::StringRecord,
    raw: &[csv::StringRecord],
    records: &[BatchRecord],
) -> Result<()> {
    let existing = headers.iter().position(|h| h == OUTPUT_COLUMN);
    let mut out_headers = headers.clone();
    if existing.is_none() {
        out_headers.push_field(OUTPUT_COLUMN);
    }
    let column = existing.unwrap_or(headers.len());

    let dir = match manifest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(tmp.as_file());
        writer.write_record(&out_headers)?;
        for (record, outcome) in raw.iter().zip(records) {
            let path = outcome
                .status
                .output()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            if fields.len() <= column {
                fields.resize(column + 1, String::new());
            }
            fields[column] = path;
            writer.write_record(&fields)?;
        }
        writer.flush()?;
    }
    tmp.persist(manifest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
