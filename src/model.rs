use std::{path::Path, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    errors::{InferenceError, ModelError},
    labels::LabelTable,
    preprocess::ImageTensor,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    /// Softmax probability of `index`.
    pub confidence: f32,
}

/// A loaded image classifier. One call classifies one image.
pub trait Classifier: Send {
    fn infer(&self, input: &ImageTensor) -> Result<Prediction, InferenceError>;
}

/// The single classifier instance; the mutex serializes every forward pass.
pub type SharedClassifier = Arc<Mutex<Box<dyn Classifier>>>;

/// Outcome of the startup load. A failed load is permanent for the process.
#[derive(Clone)]
pub enum ModelState {
    Ready(SharedClassifier),
    LoadFailed { reason: String },
}

impl ModelState {
    pub fn ready(classifier: impl Classifier + 'static) -> Self {
        Self::Ready(Arc::new(Mutex::new(Box::new(classifier))))
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }

    /// Builds the network sized to `labels` and loads `path` into it.
    pub fn load(path: &Path, labels: &LabelTable) -> Self {
        match load_classifier(path, labels.len()) {
            Ok(classifier) => {
                tracing::info!(path = %path.display(), classes = labels.len(), "model loaded");
                Self::Ready(Arc::new(Mutex::new(classifier)))
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to load model");
                Self::failed(format!("{err} (MODEL_PATH={})", path.display()))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::LoadFailed { reason } => f
                .debug_struct("LoadFailed")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Runs one forward pass on the blocking pool while holding the model lock.
/// A panic inside the runtime is reported as an inference error.
pub async fn run_inference(
    classifier: SharedClassifier,
    input: ImageTensor,
) -> Result<Prediction, InferenceError> {
    tokio::task::spawn_blocking(move || {
        let guard = classifier.blocking_lock();
        guard.infer(&input)
    })
    .await
    .map_err(|err| InferenceError::Aborted(err.to_string()))?
}

/// Index and probability of the largest softmax output.
pub fn top_prediction(logits: &[f32]) -> Option<Prediction> {
    let (index, &max) = logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let total: f32 = logits.iter().map(|&v| (v - max).exp()).sum();
    Some(Prediction {
        index,
        confidence: 1.0 / total,
    })
}

#[cfg(feature = "torch")]
fn load_classifier(path: &Path, num_classes: usize) -> Result<Box<dyn Classifier>, ModelError> {
    Ok(Box::new(torch::ResNetClassifier::load(path, num_classes)?))
}

#[cfg(not(feature = "torch"))]
fn load_classifier(_path: &Path, _num_classes: usize) -> Result<Box<dyn Classifier>, ModelError> {
    Err(ModelError::RuntimeUnavailable)
}

#[cfg(feature = "torch")]
pub mod torch {
    use std::path::Path;

    use tch::{
        nn::{FuncT, ModuleT, VarStore},
        vision::resnet,
        Device, Kind, Tensor,
    };

    use super::{top_prediction, Classifier, Prediction};
    use crate::{
        errors::{InferenceError, ModelError},
        preprocess::{ImageTensor, CROP_SIZE},
    };

    /// ResNet18 with its final layer resized to the label count.
    pub struct ResNetClassifier {
        // Owns the parameters `net` reads from.
        _vs: VarStore,
        net: FuncT<'static>,
        device: Device,
        num_classes: usize,
    }

    impl ResNetClassifier {
        pub fn load(path: &Path, num_classes: usize) -> Result<Self, ModelError> {
            if !path.exists() {
                return Err(ModelError::MissingArtifact {
                    path: path.display().to_string(),
                });
            }

            let device = Device::cuda_if_available();
            let mut vs = VarStore::new(device);
            let net = resnet::resnet18(&vs.root(), num_classes as i64);
            // Missing parameters and shape mismatches both fail here.
            vs.load(path)
                .map_err(|err| ModelError::Weights(err.to_string()))?;
            vs.freeze();

            Ok(Self {
                _vs: vs,
                net,
                device,
                num_classes,
            })
        }
    }

    impl Classifier for ResNetClassifier {
        fn infer(&self, input: &ImageTensor) -> Result<Prediction, InferenceError> {
            let side = CROP_SIZE as usize;
            let expected = ImageTensor::CHANNELS as usize * side * side;
            if input.data().len() != expected || input.shape() != [3, side, side] {
                return Err(InferenceError::InputShape {
                    expected,
                    actual: input.data().len(),
                });
            }

            let runtime = |err: tch::TchError| InferenceError::Runtime(err.to_string());
            let _no_grad = tch::no_grad_guard();

            let batch = Tensor::f_from_slice(input.data())
                .and_then(|t| t.f_view([1, 3, side as i64, side as i64]))
                .map_err(runtime)?
                .to_device(self.device);
            let logits = self
                .net
                .forward_t(&batch, false)
                .f_to_kind(Kind::Float)
                .and_then(|t| t.f_flatten(0, -1))
                .map_err(runtime)?
                .to_device(Device::Cpu);
            let logits = Vec::<f32>::try_from(&logits).map_err(runtime)?;

            if logits.len() != self.num_classes {
                return Err(InferenceError::Runtime(format!(
                    "network produced {} outputs for {} classes",
                    logits.len(),
                    self.num_classes
                )));
            }
            top_prediction(&logits)
                .ok_or_else(|| InferenceError::Runtime("network produced no outputs".into()))
        }
    }
}
