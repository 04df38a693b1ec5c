use burn::module::Param;
use burn::prelude::*;
use burn::tensor::Distribution;

use crate::model::l2_normalize;

/// Configuration for the additive angular-margin (ArcFace) head.
#[derive(Config, Debug)]
pub struct ArcMarginHeadConfig {
    /// Embedding dimension produced by the backbone.
    pub in_features: usize,
    /// Number of training identities (FIW training families).
    #[config(default = 571)]
    pub num_classes: usize,
    /// Logit scale `s`.
    #[config(default = 10.0)]
    pub s: f64,
    /// Additive angular margin `m`, in radians.
    #[config(default = 0.40)]
    pub m: f64,
    /// Clamp for L2 norms.
    #[config(default = 1e-12)]
    pub eps: f64,
}

/// Additive angular-margin classifier head.
///
/// For each row, logits are `s · cos θ_j` where `θ_j` is the angle between
/// the normalised embedding and the normalised class weight `W_j`. The
/// true-class entry is replaced by `s · cos(θ_y + m)`. Past `θ_y > π − m`,
/// where `cos(θ + m)` stops being monotonic in `θ`, the replacement is
/// `s · (cos θ_y − m · sin(π − m))` instead.
///
/// Training-only: it is never checkpointed.
#[derive(Module, Debug)]
pub struct ArcMarginHead<B: Backend> {
    /// Class weight vectors, shape `(num_classes, in_features)`.
    pub(crate) weight: Param<Tensor<B, 2>>,
    s: f64,
    m: f64,
    cos_m: f64,
    sin_m: f64,
    /// `cos(π − m)`: below this the margin is applied linearly.
    th: f64,
    /// `sin(π − m) · m`.
    mm: f64,
    eps: f64,
}

impl ArcMarginHeadConfig {
    /// Initialize the head. Weights use Xavier-uniform initialization.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ArcMarginHead<B> {
        let bound = (6.0 / (self.in_features + self.num_classes) as f64).sqrt();
        let weight = Tensor::random(
            [self.num_classes, self.in_features],
            Distribution::Uniform(-bound, bound),
            device,
        );
        let pi = std::f64::consts::PI;
        ArcMarginHead {
            weight: Param::from_tensor(weight),
            s: self.s,
            m: self.m,
            cos_m: self.m.cos(),
            sin_m: self.m.sin(),
            th: (pi - self.m).cos(),
            mm: (pi - self.m).sin() * self.m,
            eps: self.eps,
        }
    }
}

impl<B: Backend> ArcMarginHead<B> {
    /// Cosine between every embedding and every class weight.
    ///
    /// Input shape: `(batch, in_features)`
    /// Output shape: `(batch, num_classes)`
    pub fn cosine(&self, embeddings: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = l2_normalize(embeddings, self.eps);
        let w = l2_normalize(self.weight.val(), self.eps);
        x.matmul(w.transpose())
    }

    /// Margin-adjusted, scaled logits.
    ///
    /// # Panics
    /// Panics if the embedding width differs from the head's, if the label
    /// count differs from the batch size, or if any label is outside
    /// `[0, num_classes)`.
    pub fn forward(&self, embeddings: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let device = embeddings.device();
        let [batch, d_in] = embeddings.dims();
        let [num_classes, d_weight] = self.weight.dims();
        assert_eq!(
            d_in, d_weight,
            "embedding width {d_in} does not match head input {d_weight}"
        );
        let [n_labels] = labels.dims();
        assert_eq!(n_labels, batch, "got {n_labels} labels for batch of {batch}");
        check_label_range(&labels, num_classes);

        let cosine = self.cosine(embeddings);
        let sine = (cosine.clone().powf_scalar(2.0).neg() + 1.0)
            .clamp(0.0, 1.0)
            .sqrt();
        let phi = cosine.clone() * self.cos_m - sine * self.sin_m;
        let outside = cosine.clone().lower_equal_elem(self.th);
        let phi = phi.mask_where(outside, cosine.clone() - self.mm);

        let one_hot = Tensor::<B, 2>::zeros([batch, num_classes], &device).scatter(
            1,
            labels.reshape([batch, 1]),
            Tensor::ones([batch, 1], &device),
        );
        let logits = one_hot.clone() * phi + (one_hot.neg() + 1.0) * cosine;
        logits * self.s
    }

    pub fn num_classes(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn in_features(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn scale(&self) -> f64 {
        self.s
    }

    pub fn margin(&self) -> f64 {
        self.m
    }
}

fn check_label_range<B: Backend>(labels: &Tensor<B, 1, Int>, num_classes: usize) {
    if labels.dims()[0] == 0 {
        return;
    }
    let min: i64 = labels.clone().min().into_scalar().elem();
    let max: i64 = labels.clone().max().into_scalar().elem();
    assert!(
        min >= 0 && (max as usize) < num_classes,
        "label out of range: got [{min}, {max}], expected [0, {num_classes})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    /// Head over 2-d embeddings with three unit class vectors at 0°, 90°, 60°.
    fn fixed_head(device: &<TestBackend as Backend>::Device) -> ArcMarginHead<TestBackend> {
        let head = ArcMarginHeadConfig::new(2)
            .with_num_classes(3)
            .init::<TestBackend>(device);
        let (s60, c60) = (60f32.to_radians().sin(), 60f32.to_radians().cos());
        let weight = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0_f32, 0.0], [0.0, 1.0], [c60, s60]]),
            device,
        );
        ArcMarginHead {
            weight: Param::from_tensor(weight),
            ..head
        }
    }

    fn labels(values: &[i64], device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let head = ArcMarginHeadConfig::new(8).init::<TestBackend>(&device);
        let emb = Tensor::<TestBackend, 2>::random(
            [4, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let logits = head.forward(emb, labels(&[0, 5, 570, 17], &device));
        assert_eq!(logits.dims(), [4, 571]);
        assert_eq!(head.num_classes(), 571);
        assert_eq!(head.in_features(), 8);
    }

    #[test]
    fn test_margin_lowers_true_class_only() {
        let device = Default::default();
        let head = fixed_head(&device);
        let s = head.scale() as f32;
        let m = head.margin() as f32;

        let emb = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[2.0_f32, 0.0], [3.0, 0.0]]),
            &device,
        );
        let logits: Vec<f32> = head
            .forward(emb, labels(&[2, 1], &device))
            .into_data()
            .to_vec()
            .unwrap();

        // Row 0, true class 2 at θ = 60°.
        let expected = s * (60f32.to_radians() + m).cos();
        assert!((logits[2] - expected).abs() < 1e-4, "got {}, want {expected}", logits[2]);
        assert!(logits[2] < s * 0.5, "margin must lower the true-class score");
        // Other entries are plain scaled cosines.
        assert!((logits[0] - s).abs() < 1e-4);
        assert!(logits[1].abs() < 1e-4);

        // Row 1, true class 1 at θ = 90°.
        let expected = s * (90f32.to_radians() + m).cos();
        assert!((logits[4] - expected).abs() < 1e-4);
        assert!(logits[4] < 0.0);
        assert!((logits[3] - s).abs() < 1e-4);
        assert!((logits[5] - s * 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_linear_fallback_past_monotonic_range() {
        let device = Default::default();
        let head = fixed_head(&device);
        let s = head.scale() as f32;
        let m = head.margin() as f32;

        // Embedding opposite class 0: θ = 180° > π − m.
        let emb = Tensor::<TestBackend, 2>::from_data(TensorData::from([[-1.0_f32, 0.0]]), &device);
        let logits: Vec<f32> = head
            .forward(emb, labels(&[0], &device))
            .into_data()
            .to_vec()
            .unwrap();
        let mm = (std::f32::consts::PI - m).sin() * m;
        let expected = s * (-1.0 - mm);
        assert!((logits[0] - expected).abs() < 1e-4, "got {}, want {expected}", logits[0]);
    }

    #[test]
    #[should_panic(expected = "label out of range")]
    fn test_label_out_of_range_panics() {
        let device = Default::default();
        let head = fixed_head(&device);
        let emb = Tensor::<TestBackend, 2>::from_data(TensorData::from([[1.0_f32, 0.0]]), &device);
        let _ = head.forward(emb, labels(&[3], &device));
    }

    #[test]
    #[should_panic(expected = "does not match head input")]
    fn test_width_mismatch_panics() {
        let device = Default::default();
        let head = fixed_head(&device);
        let emb = Tensor::<TestBackend, 2>::zeros([1, 5], &device);
        let _ = head.forward(emb, labels(&[0], &device));
    }

    #[test]
    fn test_gradient_reaches_class_weights() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let head = ArcMarginHeadConfig::new(8)
            .with_num_classes(5)
            .init::<TestAutodiffBackend>(&device);
        let emb = Tensor::<TestAutodiffBackend, 2>::random(
            [3, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let labels = Tensor::<TestAutodiffBackend, 1, Int>::from_data(
            TensorData::new(vec![0_i64, 2, 4], [3]),
            &device,
        );
        let loss = head.forward(emb, labels).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &head);
        let grad = grads
            .get::<NdArray<f32>, 2>(head.weight.id)
            .expect("class weights should have gradient");
        let sum: f32 = grad.abs().sum().into_scalar().elem();
        assert!(sum > 0.0);
    }
}
