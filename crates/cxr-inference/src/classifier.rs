//! Classifier abstraction and the ONNX Runtime implementation.
//!
//! The lifecycle manager only sees the [`Classifier`] and [`ModelLoader`]
//! traits, so the state machine can be exercised with in-memory fakes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{InferenceError, InferenceResult};
use crate::preprocess::ImageTensor;

/// A loaded model exposing a single forward pass.
pub trait Classifier: Send + Sync {
    /// Run the model on one preprocessed image and return the raw output vector.
    fn infer(&self, input: &ImageTensor) -> InferenceResult<Vec<f32>>;
}

/// Produces classifier instances. Called on a blocking thread.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> InferenceResult<Arc<dyn Classifier>>;

    /// Human-readable source of the model, for logs.
    fn source(&self) -> String;
}

/// Configuration for the ONNX classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Intra-op thread count; runtime default when unset
    pub intra_threads: Option<usize>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("Model/classification_cnn.onnx"),
            intra_threads: None,
        }
    }
}

/// Chest X-ray CNN running on ONNX Runtime.
///
/// The session needs exclusive access to run, so concurrent callers
/// serialize on the inner mutex.
pub struct OrtClassifier {
    session: Mutex<Session>,
    output_name: String,
}

impl OrtClassifier {
    /// Load the model file at `config.model_path`.
    pub fn load(config: &ClassifierConfig) -> InferenceResult<Self> {
        let model_path = config.model_path.as_path();
        if !model_path.exists() {
            return Err(InferenceError::model_not_found(model_path.display().to_string()));
        }

        let session = create_session(model_path, config.intra_threads)?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferenceError::load_failed("Model declares no outputs"))?;

        info!(
            model_path = %model_path.display(),
            output = %output_name,
            "Classifier session created"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl Classifier for OrtClassifier {
    fn infer(&self, input: &ImageTensor) -> InferenceResult<Vec<f32>> {
        let (shape, values) = input.to_shape_and_values();
        let tensor: Value = Tensor::from_array((shape, values.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::inference_failed(format!("Failed to create tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::inference_failed("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::inference_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::inference_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("Failed to extract tensor: {}", e)))?;

        debug!(outputs = values.len(), "Forward pass completed");
        Ok(values.to_vec())
    }
}

/// Loads [`OrtClassifier`] instances from disk.
#[derive(Debug, Clone, Default)]
pub struct OrtLoader {
    config: ClassifierConfig,
}

impl OrtLoader {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OrtLoader {
    fn load(&self) -> InferenceResult<Arc<dyn Classifier>> {
        let classifier = OrtClassifier::load(&self.config)?;
        Ok(Arc::new(classifier))
    }

    fn source(&self) -> String {
        self.config.model_path.display().to_string()
    }
}

fn create_session(model_path: &Path, intra_threads: Option<usize>) -> InferenceResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| InferenceError::load_failed(format!("Failed to read model file: {}", e)))?;

    let mut builder = Session::builder()
        .map_err(|e| InferenceError::load_failed(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::load_failed(format!("Failed to set optimization level: {}", e)))?;

    if let Some(threads) = intra_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| InferenceError::load_failed(format!("Failed to set intra threads: {}", e)))?;
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| InferenceError::load_failed(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = ClassifierConfig::default();
        assert_eq!(config.model_path, PathBuf::from("Model/classification_cnn.onnx"));
        assert!(config.intra_threads.is_none());
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OrtLoader::new(ClassifierConfig {
            model_path: dir.path().join("absent.onnx"),
            intra_threads: None,
        });

        let err = loader.load().err().unwrap();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
        assert!(loader.source().ends_with("absent.onnx"));
    }

    #[test]
    fn test_corrupt_model_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an onnx graph").unwrap();

        let loader = OrtLoader::new(ClassifierConfig {
            model_path: file.path().to_path_buf(),
            intra_threads: Some(1),
        });

        let err = loader.load().err().unwrap();
        assert!(matches!(err, InferenceError::ModelLoadFailed(_)));
    }
}
