//! Landmark dataset CSV: building it from a labeled image tree and reading it back

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, Writer};
use tracing::{debug, info};

use crate::engine::{decode_image, LandmarkExtractor};
use crate::features::{csv_header, encode, FeatureVector, NUM_FEATURES};

/// One CSV row: raw detector features plus the class label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: String,
}

/// Per-label outcome of a dataset build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStats {
    pub images: usize,
    pub written: usize,
    pub unreadable: usize,
    pub no_hand: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub labels: BTreeMap<String, LabelStats>,
}

impl DatasetSummary {
    pub fn total_written(&self) -> usize {
        self.labels.values().map(|s| s.written).sum()
    }
}

/// Walk `dataset_dir/<label>/<image>` and write one CSV row per image with a
/// detected hand.
///
/// Unreadable files and images without a hand are skipped. Labels and files
/// are visited in name order so repeated runs produce identical output.
pub fn build_dataset<E: LandmarkExtractor + ?Sized>(
    extractor: &E,
    dataset_dir: &Path,
    output: &Path,
) -> Result<DatasetSummary> {
    ensure!(
        dataset_dir.is_dir(),
        "dataset directory not found: {}",
        dataset_dir.display()
    );

    let mut writer = Writer::from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    writer.write_record(csv_header())?;

    let mut summary = DatasetSummary::default();

    for label_dir in sorted_entries(dataset_dir)? {
        if !label_dir.is_dir() {
            continue;
        }
        let Some(label) = label_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        info!("Processing {}...", label);
        let mut stats = LabelStats::default();

        for image_path in sorted_entries(&label_dir)? {
            if !image_path.is_file() {
                continue;
            }
            stats.images += 1;

            let image = match fs::read(&image_path).map_err(anyhow::Error::from).and_then(|b| decode_image(&b)) {
                Ok(image) => image,
                Err(e) => {
                    debug!("Skipping unreadable {}: {}", image_path.display(), e);
                    stats.unreadable += 1;
                    continue;
                }
            };

            let landmarks = extractor
                .extract(&image)
                .with_context(|| format!("landmark extraction failed on {}", image_path.display()))?;

            let Some(landmarks) = landmarks else {
                stats.no_hand += 1;
                continue;
            };

            let mut row: Vec<String> = encode(&landmarks)
                .as_slice()
                .iter()
                .map(|v| v.to_string())
                .collect();
            row.push(label.clone());
            writer.write_record(&row)?;
            stats.written += 1;
        }

        summary.labels.insert(label, stats);
    }

    writer.flush()?;
    Ok(summary)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Read a landmark CSV, checking the header against the canonical columns
pub fn load_dataset(path: &Path) -> Result<Vec<LabeledSample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open CSV {}", path.display()))?;

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header != csv_header() {
        bail!(
            "unexpected CSV header in {}: expected x0,y0,...,x20,y20,label",
            path.display()
        );
    }

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("invalid row {} in {}", row_idx + 1, path.display()))?;

        let mut values = [0.0f32; NUM_FEATURES];
        for (i, value) in values.iter_mut().enumerate() {
            *value = record[i]
                .trim()
                .parse()
                .with_context(|| format!("invalid value in column {} of row {}", i, row_idx + 1))?;
        }

        samples.push(LabeledSample {
            features: FeatureVector::from_values(values),
            label: record[NUM_FEATURES].to_string(),
        });
    }

    Ok(samples)
}
