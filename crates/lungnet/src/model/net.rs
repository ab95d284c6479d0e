use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

/// Configuration for the LungPrediction classifier.
///
/// Fuses three input branches into one hidden representation and classifies it:
///
/// ```text
/// image (batch, C, H, W)
///   → Conv3x3(C→16·phi) → ReLU → MaxPool2x2
///   → Conv3x3(16·phi→32·phi) → ReLU → AdaptiveAvgPool(1x1) → flatten
///   → Linear(32·phi→hidden) → ReLU ─┐
/// clinical (batch, clinical_dim) → Linear → ReLU ─┼→ concat
/// aux (batch, aux_dim) → Linear → ReLU ─┘
///   → Linear(3·hidden→hidden) → ReLU
///   → layer_num × [Linear(hidden→hidden) → ReLU → Dropout]
///   → Linear(hidden→num_classes)
///   → logits: (batch, num_classes)
/// ```
#[derive(Config, Debug)]
pub struct LungPredictionConfig {
    /// Channels in the input image tensor.
    #[config(default = 1)]
    pub image_channels: usize,
    /// Length of the clinical feature vector.
    #[config(default = 9)]
    pub clinical_dim: usize,
    /// Length of the auxiliary feature vector.
    #[config(default = 4)]
    pub aux_dim: usize,
    /// Width of the fused hidden representation.
    #[config(default = 128)]
    pub hidden_size: usize,
    /// Width multiplier applied to the convolutional encoder.
    #[config(default = 1.0)]
    pub phi: f64,
    /// Number of hidden blocks in the fusion classifier.
    #[config(default = 2)]
    pub layer_num: usize,
    /// Dropout probability inside the hidden blocks.
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Number of output classes.
    #[config(default = 2)]
    pub num_classes: usize,
}

/// Multi-modal classifier over an image tensor plus clinical and auxiliary
/// feature vectors.
#[derive(Module, Debug)]
pub struct LungPrediction<B: Backend> {
    /// First image convolution: image_channels → 16·phi.
    conv1: Conv2d<B>,
    /// Second image convolution: 16·phi → 32·phi.
    conv2: Conv2d<B>,
    /// 2x2 spatial downsampling between the convolutions.
    pool: MaxPool2d,
    /// Collapses the final feature map to one value per channel.
    global_pool: AdaptiveAvgPool2d,
    /// Image branch projection to the shared hidden width.
    image_proj: Linear<B>,
    /// Clinical branch projection to the shared hidden width.
    clinical_proj: Linear<B>,
    /// Auxiliary branch projection to the shared hidden width.
    aux_proj: Linear<B>,
    /// Fusion of the concatenated branches back to the hidden width.
    fuse: Linear<B>,
    /// Hidden classifier blocks.
    hidden_layers: Vec<Linear<B>>,
    /// Dropout inside the hidden blocks. Inactive on inference backends.
    dropout: Dropout,
    activation: Relu,
    /// Classification head producing the logits.
    head: Linear<B>,
}

/// Scale a base channel width by `phi`, never below 1.
fn scaled_width(base: usize, phi: f64) -> usize {
    ((base as f64 * phi).round() as usize).max(1)
}

impl LungPredictionConfig {
    /// Initialize a LungPrediction model with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LungPrediction<B> {
        let c1 = scaled_width(16, self.phi);
        let c2 = scaled_width(32, self.phi);

        LungPrediction {
            conv1: Conv2dConfig::new([self.image_channels, c1], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            conv2: Conv2dConfig::new([c1, c2], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            image_proj: LinearConfig::new(c2, self.hidden_size).init(device),
            clinical_proj: LinearConfig::new(self.clinical_dim, self.hidden_size).init(device),
            aux_proj: LinearConfig::new(self.aux_dim, self.hidden_size).init(device),
            fuse: LinearConfig::new(3 * self.hidden_size, self.hidden_size).init(device),
            hidden_layers: (0..self.layer_num)
                .map(|_| LinearConfig::new(self.hidden_size, self.hidden_size).init(device))
                .collect(),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
            head: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
        }
    }
}

impl<B: Backend> LungPrediction<B> {
    /// Forward pass over one batch.
    ///
    /// Input shapes: images `(batch, C, H, W)`, clinical
    /// `(batch, clinical_dim)`, aux `(batch, aux_dim)`.
    /// Returns `(logits, features)` with shapes `(batch, num_classes)` and
    /// `(batch, hidden_size)`.
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        clinical: Tensor<B, 2>,
        aux: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.pool.forward(x);
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.global_pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let x = x.reshape([batch, channels]);

        let image_feat = self.activation.forward(self.image_proj.forward(x));
        let clinical_feat = self.activation.forward(self.clinical_proj.forward(clinical));
        let aux_feat = self.activation.forward(self.aux_proj.forward(aux));

        let fused = Tensor::cat(vec![image_feat, clinical_feat, aux_feat], 1);
        let mut features = self.activation.forward(self.fuse.forward(fused));
        for layer in &self.hidden_layers {
            features = self.dropout.forward(self.activation.forward(layer.forward(features)));
        }

        let logits = self.head.forward(features.clone());
        (logits, features)
    }
}
