use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::error::StreamError;

/// File extension of entries in the model store.
pub const MODEL_EXTENSION: &str = "onnx";

/// A warmed backend shared across sessions.
///
/// `infer` takes `&mut self`, so concurrent sessions selecting the same
/// identifier serialize their inference calls on this mutex.
pub type SharedBackend = Arc<Mutex<Box<dyn DetectorBackend>>>;

/// Loads a backend for a resolved model file.
///
/// The seam between the registry and concrete inference: the daemon wires
/// the default loader, tests inject scripted ones.
pub trait BackendLoader: Send + Sync {
    fn load(&self, identifier: &str, model_path: &Path) -> Result<Box<dyn DetectorBackend>>;
}

/// Process-wide registry of warmed detector backends, keyed by model
/// identifier.
///
/// The first selection of an identifier pays the load and warm-up cost;
/// later selections return the same instance. Entries are never evicted and
/// are immutable once inserted. The map mutex is held across warm-up, so a
/// racing selection of the same identifier cannot register a second live
/// instance.
pub struct BackendRegistry {
    model_dir: PathBuf,
    loader: Box<dyn BackendLoader>,
    warmed: Mutex<HashMap<String, SharedBackend>>,
}

impl BackendRegistry {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self::with_loader(model_dir, Box::new(DefaultLoader))
    }

    pub fn with_loader(model_dir: impl Into<PathBuf>, loader: Box<dyn BackendLoader>) -> Self {
        Self {
            model_dir: model_dir.into(),
            loader,
            warmed: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve an identifier and return its warmed backend.
    pub fn select(&self, identifier: &str) -> Result<SharedBackend, StreamError> {
        let model_path = self.resolve(identifier)?;

        let mut warmed = self
            .warmed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(backend) = warmed.get(identifier) {
            return Ok(backend.clone());
        }

        let mut backend = self
            .loader
            .load(identifier, &model_path)
            .map_err(|err| StreamError::ModelNotFound(format!("{identifier}: {err:#}")))?;
        backend
            .warm_up()
            .map_err(|err| StreamError::ModelNotFound(format!("{identifier}: {err:#}")))?;

        let backend: SharedBackend = Arc::new(Mutex::new(backend));
        warmed.insert(identifier.to_string(), backend.clone());
        log::info!("warmed detector backend {identifier}");
        Ok(backend)
    }

    /// List model identifiers available for selection, sorted
    /// lexicographically.
    ///
    /// An absent or unreadable store yields an empty list, never an error.
    pub fn list_models(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.model_dir) else {
            return Vec::new();
        };
        let mut models: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                Path::new(name).extension().and_then(|ext| ext.to_str()) == Some(MODEL_EXTENSION)
            })
            .collect();
        models.sort();
        models
    }

    /// Resolve an identifier to a model file path.
    ///
    /// Identifiers must be bare filenames of the model store carrying the
    /// model extension; path separators, parent components, and missing files
    /// are all `ModelNotFound`.
    fn resolve(&self, identifier: &str) -> Result<PathBuf, StreamError> {
        let not_found = || StreamError::ModelNotFound(identifier.to_string());
        if identifier.is_empty() {
            return Err(not_found());
        }
        let candidate = Path::new(identifier);
        let is_bare = candidate
            .file_name()
            .map(|name| name == candidate.as_os_str())
            .unwrap_or(false);
        if !is_bare {
            return Err(not_found());
        }
        if candidate.extension().and_then(|ext| ext.to_str()) != Some(MODEL_EXTENSION) {
            return Err(not_found());
        }
        let path = self.model_dir.join(identifier);
        if !path.is_file() {
            return Err(not_found());
        }
        Ok(path)
    }
}

/// Production loader: tract ONNX inference when built with `backend-tract`,
/// otherwise the pure-Rust luminance detector.
pub struct DefaultLoader;

impl BackendLoader for DefaultLoader {
    #[cfg(feature = "backend-tract")]
    fn load(&self, identifier: &str, model_path: &Path) -> Result<Box<dyn DetectorBackend>> {
        Ok(Box::new(crate::detect::backends::TractBackend::new(
            identifier, model_path,
        )?))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn load(&self, identifier: &str, _model_path: &Path) -> Result<Box<dyn DetectorBackend>> {
        Ok(Box::new(crate::detect::backends::LumaBackend::new(
            identifier,
        )))
    }
}
