use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

use crate::error::PpaError;
use crate::io::open_maybe_gz;
use crate::schema::v1::{DatasetV1, PatternRecord, SCHEMA_VERSION, SampleRecord};
use crate::spatial::{Point, PointPattern};
use crate::table::{Column, SampleCollection};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Pattern columns every sample must carry.
    pub required_patterns: Vec<String>,
}

/// Reads a dataset file (gzip-compressed when the name ends in `.gz`) into a
/// sample collection. Columns are laid out as patterns, then factors, then
/// scalars, each group in name order.
pub fn load_collection(path: &Path, options: &LoadOptions) -> Result<SampleCollection, PpaError> {
    let reader = open_maybe_gz(path).map_err(|e| PpaError::load(path, e.to_string()))?;
    let dataset: DatasetV1 = serde_json::from_reader(std::io::BufReader::new(reader))
        .map_err(|e| PpaError::load(path, format!("malformed dataset: {}", e)))?;
    let collection = collection_from_dataset(dataset, options).map_err(|e| match e {
        PpaError::Load { .. } => e,
        other => PpaError::load(path, other.to_string()),
    })?;
    info!(
        path = %path.display(),
        samples = collection.len(),
        columns = collection.column_names().count(),
        "dataset_loaded"
    );
    Ok(collection)
}

pub fn collection_from_dataset(
    dataset: DatasetV1,
    options: &LoadOptions,
) -> Result<SampleCollection, PpaError> {
    if dataset.schema_version != SCHEMA_VERSION {
        return Err(PpaError::Column(format!(
            "unsupported schema version '{}'",
            dataset.schema_version
        )));
    }
    let Some(first) = dataset.samples.first() else {
        return Err(PpaError::Column("dataset has no samples".to_string()));
    };
    let pattern_keys: Vec<String> = first.patterns.keys().cloned().collect();
    let metadata_keys: Vec<String> = first.metadata.keys().cloned().collect();
    let scalar_keys: Vec<String> = first.scalars.keys().cloned().collect();

    for required in &options.required_patterns {
        if !pattern_keys.contains(required) {
            return Err(PpaError::Column(format!(
                "expected pattern column '{}' is missing",
                required
            )));
        }
    }

    for sample in &dataset.samples {
        check_keys(&sample.id, "pattern", &pattern_keys, sample.patterns.keys())?;
        check_keys(&sample.id, "metadata", &metadata_keys, sample.metadata.keys())?;
        check_keys(&sample.id, "scalar", &scalar_keys, sample.scalars.keys())?;
        check_shared_window(sample)?;
    }

    let ids: Vec<String> = dataset.samples.iter().map(|s| s.id.clone()).collect();
    let mut collection = SampleCollection::new(ids)?;

    for key in &pattern_keys {
        let mut patterns = Vec::with_capacity(dataset.samples.len());
        for sample in &dataset.samples {
            let record = &sample.patterns[key];
            patterns.push(pattern_from_record(&sample.id, key, record)?);
        }
        collection.append_column(key.clone(), Column::Pattern(patterns))?;
    }
    for key in &metadata_keys {
        let values = dataset
            .samples
            .iter()
            .map(|s| s.metadata[key].clone())
            .collect();
        collection.append_column(key.clone(), Column::Factor(values))?;
    }
    for key in &scalar_keys {
        let values = dataset.samples.iter().map(|s| s.scalars[key]).collect();
        collection.append_column(key.clone(), Column::Scalar(values))?;
    }

    Ok(collection)
}

fn check_keys<'a>(
    sample: &str,
    what: &str,
    expected: &[String],
    got: impl Iterator<Item = &'a String>,
) -> Result<(), PpaError> {
    let got: Vec<&String> = got.collect();
    if got.len() != expected.len() || got.iter().zip(expected.iter()).any(|(a, b)| *a != b) {
        return Err(PpaError::Column(format!(
            "sample '{}' has {} columns {:?}, expected {:?}",
            sample, what, got, expected
        )));
    }
    Ok(())
}

/// Every pattern of a sample is observed in the same window.
fn check_shared_window(sample: &SampleRecord) -> Result<(), PpaError> {
    let mut records = sample.patterns.iter();
    let Some((first_name, first)) = records.next() else {
        return Ok(());
    };
    for (name, record) in records {
        if record.window != first.window {
            return Err(PpaError::Column(format!(
                "sample '{}' patterns '{}' and '{}' have different windows",
                sample.id, first_name, name
            )));
        }
    }
    Ok(())
}

fn pattern_from_record(
    sample: &str,
    column: &str,
    record: &PatternRecord,
) -> Result<PointPattern, PpaError> {
    if record.window.is_degenerate() {
        return Err(PpaError::Column(format!(
            "sample '{}' pattern '{}' has a degenerate window",
            sample, column
        )));
    }
    let mut points = Vec::with_capacity(record.points.len());
    for (i, [x, y]) in record.points.iter().enumerate() {
        match (x, y) {
            (Some(x), Some(y)) => points.push(Point { x: *x, y: *y }),
            _ => {
                return Err(PpaError::Column(format!(
                    "sample '{}' pattern '{}' point {} has a missing coordinate",
                    sample, column, i
                )));
            }
        }
    }
    let pattern = PointPattern::new(record.window.clone(), points).map_err(|e| {
        PpaError::Column(format!("sample '{}' pattern '{}': {}", sample, column, e))
    })?;
    Ok(match &record.label {
        Some(label) => pattern.with_label(label.clone()),
        None => pattern,
    })
}

/// Serializes the persistable columns (patterns, factors, scalars).
pub fn dataset_from_collection(collection: &SampleCollection) -> DatasetV1 {
    let mut samples: Vec<SampleRecord> = collection
        .ids()
        .iter()
        .map(|id| SampleRecord {
            id: id.clone(),
            metadata: BTreeMap::new(),
            scalars: BTreeMap::new(),
            patterns: BTreeMap::new(),
        })
        .collect();
    for (name, column) in collection.columns() {
        match column {
            Column::Pattern(patterns) => {
                for (record, pattern) in samples.iter_mut().zip(patterns.iter()) {
                    record.patterns.insert(
                        name.to_string(),
                        PatternRecord {
                            window: pattern.window().clone(),
                            points: pattern
                                .points()
                                .iter()
                                .map(|p| [Some(p.x), Some(p.y)])
                                .collect(),
                            label: pattern.label().map(str::to_string),
                        },
                    );
                }
            }
            Column::Factor(values) => {
                for (record, value) in samples.iter_mut().zip(values.iter()) {
                    record.metadata.insert(name.to_string(), value.clone());
                }
            }
            Column::Scalar(values) => {
                for (record, value) in samples.iter_mut().zip(values.iter()) {
                    record.scalars.insert(name.to_string(), *value);
                }
            }
            Column::Field(_) | Column::ModelRef(_) => {}
        }
    }
    DatasetV1 {
        schema_version: SCHEMA_VERSION.to_string(),
        samples,
    }
}

pub fn save_collection(path: &Path, collection: &SampleCollection) -> Result<(), PpaError> {
    let dataset = dataset_from_collection(collection);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, &dataset)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &dataset)?;
        writer.flush()?;
    }
    info!(path = %path.display(), samples = collection.len(), "dataset_saved");
    Ok(())
}
