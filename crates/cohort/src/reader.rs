//! Reads cohort Parquet files into validated in-memory cohorts.

use crate::types::{Cohort, SampleRecord, Split, TensorShapes};
use anyhow::{anyhow, bail, Context};
use arrow::array::{Array, Float32Array, Int64Array, ListArray, StringArray, UInt32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Reads cohort samples from Parquet files written by `CohortWriter` (or an
/// upstream exporter producing the same schema).
pub struct CohortReader;

impl CohortReader {
    /// Read the file for `split` under a data root
    /// (`<root>/<split stem>.parquet`).
    pub fn read_split(root: &Path, split: Split, num_classes: usize) -> anyhow::Result<Cohort> {
        Self::read(&root.join(split.file_name()), split, num_classes)
    }

    /// Read a cohort from a single Parquet file, validating tensor shapes
    /// and label range. Labels must lie in `0..num_classes`; all rows must
    /// share one set of tensor shapes.
    pub fn read(path: &Path, split: Split, num_classes: usize) -> anyhow::Result<Cohort> {
        let file = File::open(path)
            .with_context(|| format!("Opening cohort file {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("Reading Parquet metadata from {}", path.display()))?
            .build()?;

        let mut records = Vec::new();
        let mut shapes: Option<TensorShapes> = None;
        for batch in reader {
            let batch = batch?;
            extract_records(&batch, num_classes, &mut shapes, &mut records)
                .with_context(|| format!("Reading {}", path.display()))?;
        }

        let shapes =
            shapes.ok_or_else(|| anyhow!("Cohort file {} contains no samples", path.display()))?;

        tracing::info!(
            split = %split,
            records = records.len(),
            path = %path.display(),
            "Loaded cohort"
        );

        Ok(Cohort {
            split,
            shapes,
            records,
        })
    }
}

/// Pull validated sample records out of one Arrow batch, carrying the
/// cohort-wide shapes across batches.
fn extract_records(
    batch: &RecordBatch,
    num_classes: usize,
    shapes: &mut Option<TensorShapes>,
    out: &mut Vec<SampleRecord>,
) -> anyhow::Result<()> {
    let sample_ids = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("Column 0 (sample_id) is not a StringArray"))?;
    let labels = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| anyhow!("Column 1 (label) is not an Int64Array"))?;
    let images = batch
        .column(2)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| anyhow!("Column 2 (image) is not a ListArray"))?;
    let channels = batch
        .column(3)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| anyhow!("Column 3 (image_channels) is not a UInt32Array"))?;
    let heights = batch
        .column(4)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| anyhow!("Column 4 (image_height) is not a UInt32Array"))?;
    let widths = batch
        .column(5)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| anyhow!("Column 5 (image_width) is not a UInt32Array"))?;
    let clinicals = batch
        .column(6)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| anyhow!("Column 6 (clinical) is not a ListArray"))?;
    let auxes = batch
        .column(7)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| anyhow!("Column 7 (aux) is not a ListArray"))?;

    for row in 0..batch.num_rows() {
        let index = out.len();
        let sample_id = sample_ids.value(row).to_string();

        let image = list_values(images, row, "image")?;
        let clinical = list_values(clinicals, row, "clinical")?;
        let aux = list_values(auxes, row, "aux")?;

        let row_shapes = TensorShapes {
            image: [
                channels.value(row) as usize,
                heights.value(row) as usize,
                widths.value(row) as usize,
            ],
            clinical: clinical.len(),
            aux: aux.len(),
        };

        match shapes {
            Some(expected) => {
                if *expected != row_shapes {
                    bail!(
                        "Sample {index} ({sample_id}): shapes {row_shapes:?} differ from cohort shapes {expected:?}"
                    );
                }
            }
            None => *shapes = Some(row_shapes),
        }

        if image.len() != row_shapes.image_len() {
            bail!(
                "Sample {index} ({sample_id}): image has {} values, expected {}",
                image.len(),
                row_shapes.image_len()
            );
        }

        let label = labels.value(row);
        if label < 0 || label >= num_classes as i64 {
            bail!("Sample {index} ({sample_id}): label {label} outside 0..{num_classes}");
        }

        out.push(SampleRecord {
            sample_id,
            image,
            clinical,
            aux,
            label,
        });
    }

    Ok(())
}

/// Extract one row of a List<Float32> column as a Vec<f32>.
fn list_values(array: &ListArray, row: usize, name: &str) -> anyhow::Result<Vec<f32>> {
    let values = array.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| anyhow!("Column {name} does not contain Float32 values"))?;
    Ok(floats.values().to_vec())
}
