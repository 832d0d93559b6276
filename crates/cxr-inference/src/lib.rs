//! Model lifecycle, preprocessing and ONNX inference.
//!
//! - [`ModelManager`]: owns the single classifier instance and its
//!   `Unloaded -> Loading -> {Ready, Failed}` state machine
//! - [`preprocess`]: decode, grayscale, 128x128 stretch, normalize
//! - [`OrtClassifier`]: ONNX Runtime backed [`Classifier`]

pub mod classifier;
pub mod error;
pub mod lifecycle;
pub mod preprocess;

pub use classifier::{Classifier, ClassifierConfig, ModelLoader, OrtClassifier, OrtLoader};
pub use error::{InferenceError, InferenceResult};
pub use lifecycle::ModelManager;
pub use preprocess::{preprocess, ImageTensor, INPUT_SIZE};
