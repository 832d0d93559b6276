//! Model lifecycle management.
//!
//! [`ModelManager`] owns the single classifier instance. Readiness lives in a
//! `watch` channel so status reads never wait on loading or inference; the
//! model itself sits behind one exclusive lock that is held to install it,
//! to run a forward pass, and to unload it. A separate load gate keeps two
//! loads from building sessions at the same time.
//!
//! Every transition into `Loading` or `Unloaded` bumps a generation counter.
//! A background load only installs its result if the generation it started
//! with is still current, so an unload issued mid-load wins.

use std::sync::Arc;
use std::time::Instant;

use cxr_models::{Diagnosis, ModelState, ModelStatus, Prediction};
use metrics::{gauge, histogram};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, ModelLoader};
use crate::error::{InferenceError, InferenceResult};
use crate::preprocess::ImageTensor;

/// Metric names recorded by the lifecycle manager.
pub mod names {
    pub const MODEL_STATE: &str = "cxr_model_state";
    pub const MODEL_LOAD_DURATION_SECONDS: &str = "cxr_model_load_duration_seconds";
    pub const INFERENCE_DURATION_SECONDS: &str = "cxr_inference_duration_seconds";
}

#[derive(Debug, Clone)]
struct Snapshot {
    status: ModelStatus,
    generation: u64,
}

struct Inner {
    loader: Arc<dyn ModelLoader>,
    status: watch::Sender<Snapshot>,
    model: Arc<Mutex<Option<Arc<dyn Classifier>>>>,
    load_gate: Mutex<()>,
}

/// Shared handle to the classifier and its lifecycle state.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<Inner>,
}

impl ModelManager {
    /// Create a manager in the `Unloaded` state. Nothing is loaded until
    /// [`ensure_loading_started`](Self::ensure_loading_started) is called.
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        let (status, _) = watch::channel(Snapshot {
            status: ModelStatus::unloaded(),
            generation: 0,
        });
        gauge!(names::MODEL_STATE).set(ModelState::Unloaded.gauge_value());

        Self {
            inner: Arc::new(Inner {
                loader,
                status,
                model: Arc::new(Mutex::new(None)),
                load_gate: Mutex::new(()),
            }),
        }
    }

    /// Current status. Never blocks on loading or inference.
    pub fn status(&self) -> ModelStatus {
        self.inner.status.borrow().status.clone()
    }

    pub fn state(&self) -> ModelState {
        self.inner.status.borrow().status.state
    }

    pub fn model_source(&self) -> String {
        self.inner.loader.source()
    }

    /// Start a background load if the model is `Unloaded`.
    ///
    /// No-op while `Loading`, `Ready` or `Failed`; a failed load needs
    /// [`retry`](Self::retry). Returns whether a load was started. Must be
    /// called from within a Tokio runtime.
    pub fn ensure_loading_started(&self) -> bool {
        self.begin_load(|state| state == ModelState::Unloaded)
    }

    /// Start a background load from `Failed` or `Unloaded`.
    pub fn retry(&self) -> bool {
        self.begin_load(|state| matches!(state, ModelState::Failed | ModelState::Unloaded))
    }

    fn begin_load(&self, allowed: impl FnOnce(ModelState) -> bool) -> bool {
        let mut generation = 0;
        let started = self.inner.status.send_if_modified(|snap| {
            if !allowed(snap.status.state) {
                return false;
            }
            snap.generation += 1;
            snap.status = ModelStatus::loading();
            generation = snap.generation;
            true
        });

        if started {
            gauge!(names::MODEL_STATE).set(ModelState::Loading.gauge_value());
            info!(
                source = %self.inner.loader.source(),
                generation,
                "Model loading started in background"
            );
            tokio::spawn(self.clone().run_load(generation));
        } else {
            debug!(state = %self.state(), "Model load already started or not allowed");
        }
        started
    }

    async fn run_load(self, generation: u64) {
        let _gate = self.inner.load_gate.lock().await;
        if !self.is_loading(generation) {
            debug!(generation, "Skipping superseded model load");
            return;
        }

        let loader = Arc::clone(&self.inner.loader);
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || load_and_warm_up(loader.as_ref()))
            .await
            .unwrap_or_else(|e| Err(InferenceError::load_failed(format!("Loader task failed: {}", e))));
        let elapsed = started.elapsed();

        // Holding the model lock pins the generation: only unload changes it
        // while the state is Loading, and unload needs this lock.
        let mut model = self.inner.model.lock().await;
        if !self.is_loading(generation) {
            info!(generation, "Discarding model loaded after unload was requested");
            return;
        }

        let next = match result {
            Ok(loaded) => {
                *model = Some(loaded);
                histogram!(names::MODEL_LOAD_DURATION_SECONDS).record(elapsed.as_secs_f64());
                info!(
                    duration_ms = elapsed.as_millis() as u64,
                    "Model loaded successfully and ready for predictions"
                );
                ModelStatus::ready(elapsed.as_millis() as u64)
            }
            Err(e) => {
                error!(error = %e, "Model load failed");
                ModelStatus::failed(e.to_string())
            }
        };

        gauge!(names::MODEL_STATE).set(next.state.gauge_value());
        self.inner.status.send_modify(|snap| snap.status = next);
    }

    fn is_loading(&self, generation: u64) -> bool {
        let snap = self.inner.status.borrow();
        snap.generation == generation && snap.status.state == ModelState::Loading
    }

    /// Run the model and return the raw output vector.
    ///
    /// Fails fast with [`InferenceError::ModelNotReady`] unless `Ready`.
    pub async fn predict(&self, input: ImageTensor) -> InferenceResult<Vec<f32>> {
        let state = self.state();
        if !state.is_ready() {
            return Err(InferenceError::not_ready(state));
        }

        let slot = Arc::clone(&self.inner.model).lock_owned().await;
        let model = match slot.as_ref() {
            Some(model) => Arc::clone(model),
            // Unloaded between the state check and the lock.
            None => return Err(InferenceError::not_ready(self.state())),
        };

        // The guard moves into the blocking task so the lock stays held until
        // the forward pass ends, even if this future is dropped.
        let started = Instant::now();
        let output = tokio::task::spawn_blocking(move || {
            let output = model.infer(&input);
            drop(model);
            drop(slot);
            output
        })
        .await
        .map_err(|e| InferenceError::inference_failed(format!("Inference task failed: {}", e)))??;

        histogram!(names::INFERENCE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        Ok(output)
    }

    /// Run the model and map its output onto the diagnosis label table.
    pub async fn classify(&self, input: ImageTensor) -> InferenceResult<Prediction> {
        let output = self.predict(input).await?;
        Prediction::from_output(&output).map_err(|e| {
            warn!(error = %e, "Model output could not be mapped to labels");
            InferenceError::inference_failed(e.to_string())
        })
    }

    /// Release the model and return to `Unloaded`.
    ///
    /// Waits for an in-flight forward pass to finish first. A load still in
    /// progress is invalidated and its result dropped. Returns whether a
    /// model instance was released.
    pub async fn unload(&self) -> bool {
        let mut slot = self.inner.model.lock().await;
        let released = slot.take();

        let mut previous = ModelState::Unloaded;
        self.inner.status.send_if_modified(|snap| {
            previous = snap.status.state;
            if previous == ModelState::Unloaded {
                return false;
            }
            snap.generation += 1;
            snap.status = ModelStatus::unloaded();
            true
        });
        drop(slot);

        let was_loaded = released.is_some();
        drop(released);
        gauge!(names::MODEL_STATE).set(ModelState::Unloaded.gauge_value());

        if was_loaded {
            info!(previous_state = %previous, "Model unloaded from memory");
        } else {
            info!(previous_state = %previous, "Unload requested but no model was loaded");
        }
        was_loaded
    }

    /// Wait until the state is no longer `Loading`.
    pub async fn wait_until_settled(&self) -> ModelStatus {
        let mut rx = self.inner.status.subscribe();
        let settled = match rx
            .wait_for(|snap| snap.status.state != ModelState::Loading)
            .await
        {
            Ok(snap) => snap.status.clone(),
            Err(_) => self.status(),
        };
        settled
    }
}

/// Load the model and run one zero-input pass.
///
/// The warmup also checks that the output width matches the label table,
/// so an artifact trained with a different class order or count never
/// reaches `Ready`.
fn load_and_warm_up(loader: &dyn ModelLoader) -> InferenceResult<Arc<dyn Classifier>> {
    let model = loader.load()?;

    let output = model
        .infer(&ImageTensor::zeros())
        .map_err(|e| InferenceError::load_failed(format!("Warmup inference failed: {}", e)))?;

    if output.len() != Diagnosis::COUNT {
        return Err(InferenceError::load_failed(format!(
            "Model outputs {} classes but the label table has {} ({})",
            output.len(),
            Diagnosis::COUNT,
            Diagnosis::labels().join(", ")
        )));
    }

    debug!("Model warmup complete");
    Ok(model)
}
