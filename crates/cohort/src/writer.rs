//! Writes cohort samples to Parquet files using Arrow.

use crate::types::{SampleRecord, TensorShapes};
use anyhow::bail;
use arrow::array::{Float32Builder, Int64Array, ListBuilder, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::path::PathBuf;
use std::sync::Arc;

/// Arrow schema for cohort Parquet files (8 columns).
pub fn cohort_schema() -> Schema {
    let float_item = Field::new("item", DataType::Float32, true);
    Schema::new(vec![
        Field::new("sample_id", DataType::Utf8, false),
        Field::new("label", DataType::Int64, false),
        Field::new_list("image", float_item.clone(), false),
        Field::new("image_channels", DataType::UInt32, false),
        Field::new("image_height", DataType::UInt32, false),
        Field::new("image_width", DataType::UInt32, false),
        Field::new_list("clinical", float_item.clone(), false),
        Field::new_list("aux", float_item, false),
    ])
}

/// Buffers sample records and writes them to a Parquet file.
pub struct CohortWriter {
    records: Vec<SampleRecord>,
    shapes: TensorShapes,
    output_path: PathBuf,
}

impl CohortWriter {
    /// Create a new writer for the given path. Every buffered record must
    /// match `shapes`; `finish` rejects the batch otherwise.
    pub fn new(output_path: PathBuf, shapes: TensorShapes) -> Self {
        Self {
            records: Vec::new(),
            shapes,
            output_path,
        }
    }

    /// Buffer a single sample.
    pub fn record(&mut self, record: SampleRecord) {
        self.records.push(record);
    }

    /// Buffer multiple samples.
    pub fn record_all(&mut self, records: Vec<SampleRecord>) {
        self.records.extend(records);
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validate buffered samples, write them to the Parquet file, and return
    /// the output path.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        for (index, record) in self.records.iter().enumerate() {
            if record.image.len() != self.shapes.image_len() {
                bail!(
                    "Sample {index} ({}): image has {} values, expected {}x{}x{} = {}",
                    record.sample_id,
                    record.image.len(),
                    self.shapes.image[0],
                    self.shapes.image[1],
                    self.shapes.image[2],
                    self.shapes.image_len()
                );
            }
            if record.clinical.len() != self.shapes.clinical {
                bail!(
                    "Sample {index} ({}): clinical vector has {} values, expected {}",
                    record.sample_id,
                    record.clinical.len(),
                    self.shapes.clinical
                );
            }
            if record.aux.len() != self.shapes.aux {
                bail!(
                    "Sample {index} ({}): aux vector has {} values, expected {}",
                    record.sample_id,
                    record.aux.len(),
                    self.shapes.aux
                );
            }
        }

        let schema = Arc::new(cohort_schema());
        let batch = if self.records.is_empty() {
            RecordBatch::new_empty(schema.clone())
        } else {
            build_record_batch(&self.records, &self.shapes)?
        };

        let file = std::fs::File::create(&self.output_path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(
            records = self.records.len(),
            path = %self.output_path.display(),
            "Wrote cohort Parquet file"
        );

        Ok(self.output_path)
    }
}

/// Build an Arrow RecordBatch from sample records.
fn build_record_batch(
    records: &[SampleRecord],
    shapes: &TensorShapes,
) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(cohort_schema());

    let sample_ids: StringArray = records.iter().map(|r| Some(r.sample_id.as_str())).collect();
    let labels: Int64Array = records.iter().map(|r| Some(r.label)).collect();
    let channels: UInt32Array = records.iter().map(|_| Some(shapes.image[0] as u32)).collect();
    let heights: UInt32Array = records.iter().map(|_| Some(shapes.image[1] as u32)).collect();
    let widths: UInt32Array = records.iter().map(|_| Some(shapes.image[2] as u32)).collect();

    let mut image_builder = ListBuilder::new(Float32Builder::new());
    let mut clinical_builder = ListBuilder::new(Float32Builder::new());
    let mut aux_builder = ListBuilder::new(Float32Builder::new());
    for r in records {
        image_builder.values().append_slice(&r.image);
        image_builder.append(true);
        clinical_builder.values().append_slice(&r.clinical);
        clinical_builder.append(true);
        aux_builder.values().append_slice(&r.aux);
        aux_builder.append(true);
    }

    let columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(sample_ids),
        Arc::new(labels),
        Arc::new(image_builder.finish()),
        Arc::new(channels),
        Arc::new(heights),
        Arc::new(widths),
        Arc::new(clinical_builder.finish()),
        Arc::new(aux_builder.finish()),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}
