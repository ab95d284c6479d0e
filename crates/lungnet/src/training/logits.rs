//! Logit bridge: utilities to convert model outputs (`Tensor<B, 2>`) into
//! the plain `i64`/`f64` sequences the metric aggregator consumes.

use burn::prelude::*;
use burn::tensor::activation::softmax;

/// Fraction of samples in one batch where the argmax class equals the label.
pub fn batch_accuracy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> f64 {
    let [batch, _] = logits.dims();
    let predictions: Tensor<B, 1, Int> = logits.argmax(1).squeeze(1);
    let correct: i64 = predictions.equal(labels).int().sum().into_scalar().elem();
    correct as f64 / batch as f64
}

/// Argmax class index for each sample in the batch.
pub fn predicted_classes<B: Backend>(logits: Tensor<B, 2>) -> Vec<i64> {
    let predictions: Tensor<B, 1, Int> = logits.argmax(1).squeeze(1);
    predictions.into_data().to_vec::<i64>().unwrap()
}

/// Probability assigned to class 1 for each sample, via a softmax over
/// the class dimension.
pub fn positive_class_probabilities<B: Backend>(logits: Tensor<B, 2>) -> Vec<f64> {
    let [batch, _] = logits.dims();
    let positive = softmax(logits, 1).slice([0..batch, 1..2]).reshape([batch]);
    positive
        .into_data()
        .to_vec::<f32>()
        .unwrap()
        .into_iter()
        .map(|v| v as f64)
        .collect()
}

/// Extract integer labels from a 1D label tensor.
pub fn labels_to_vec<B: Backend>(labels: Tensor<B, 1, Int>) -> Vec<i64> {
    labels.into_data().to_vec::<i64>().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn logits_3x2(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        Tensor::from_data(
            TensorData::from([[2.0_f32, 1.0], [0.0, 3.0], [5.0, 0.0]]),
            device,
        )
    }

    #[test]
    fn test_batch_accuracy() {
        let device = Default::default();
        let logits = logits_3x2(&device);
        let labels = Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([0_i64, 1, 1]), &device);

        // Predictions are [0, 1, 0]; two of three match.
        let accuracy = batch_accuracy(logits, labels);
        assert!((accuracy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_predicted_classes() {
        let device = Default::default();
        let predictions = predicted_classes(logits_3x2(&device));
        assert_eq!(predictions, vec![0, 1, 0]);
    }

    #[test]
    fn test_positive_class_probabilities() {
        let device = Default::default();
        // Equal logits give 0.5; a log(3) gap gives 0.75.
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.0_f32, 0.0], [0.0, 3.0_f32.ln()]]),
            &device,
        );

        let probabilities = positive_class_probabilities(logits);
        assert!((probabilities[0] - 0.5).abs() < 1e-6);
        assert!((probabilities[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_labels_round_trip() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([1_i64, 0, 1, 1]), &device);
        assert_eq!(labels_to_vec(labels), vec![1, 0, 1, 1]);
    }
}
