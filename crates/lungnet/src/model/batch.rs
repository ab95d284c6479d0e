use burn::prelude::*;
use burn::tensor::TensorData;
use cohort::{SampleRecord, TensorShapes};

/// One batch of cohort samples converted to backend tensors.
#[derive(Debug, Clone)]
pub struct LungBatch<B: Backend> {
    /// Image tensors, shape `(batch, channels, height, width)`.
    pub images: Tensor<B, 4>,
    /// Clinical feature vectors, shape `(batch, clinical_dim)`.
    pub clinical: Tensor<B, 2>,
    /// Auxiliary feature vectors, shape `(batch, aux_dim)`.
    pub aux: Tensor<B, 2>,
    /// Class labels, shape `(batch,)`.
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> LungBatch<B> {
    /// Convert a slice of cohort records into one device batch.
    ///
    /// All records must match `shapes`; the cohort reader enforces this
    /// when loading from Parquet.
    pub fn from_records(
        records: &[SampleRecord],
        shapes: &TensorShapes,
        device: &B::Device,
    ) -> Self {
        assert!(!records.is_empty(), "Batch must contain at least one sample");

        let batch = records.len();
        let [channels, height, width] = shapes.image;

        let mut image_values = Vec::with_capacity(batch * shapes.image_len());
        let mut clinical_values = Vec::with_capacity(batch * shapes.clinical);
        let mut aux_values = Vec::with_capacity(batch * shapes.aux);
        let mut labels = Vec::with_capacity(batch);

        for record in records {
            assert_eq!(
                record.image.len(),
                shapes.image_len(),
                "Sample {} image length does not match cohort shapes",
                record.sample_id
            );
            assert_eq!(
                record.clinical.len(),
                shapes.clinical,
                "Sample {} clinical length does not match cohort shapes",
                record.sample_id
            );
            assert_eq!(
                record.aux.len(),
                shapes.aux,
                "Sample {} aux length does not match cohort shapes",
                record.sample_id
            );

            image_values.extend_from_slice(&record.image);
            clinical_values.extend_from_slice(&record.clinical);
            aux_values.extend_from_slice(&record.aux);
            labels.push(record.label);
        }

        Self {
            images: Tensor::from_data(
                TensorData::new(image_values, [batch, channels, height, width]),
                device,
            ),
            clinical: Tensor::from_data(
                TensorData::new(clinical_values, [batch, shapes.clinical]),
                device,
            ),
            aux: Tensor::from_data(TensorData::new(aux_values, [batch, shapes.aux]), device),
            labels: Tensor::from_data(TensorData::new(labels, [batch]), device),
        }
    }

    /// Number of samples in this batch.
    pub fn batch_size(&self) -> usize {
        self.labels.dims()[0]
    }
}
