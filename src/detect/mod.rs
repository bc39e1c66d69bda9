mod backend;
pub mod backends;
mod detection;
mod registry;

pub use backend::DetectorBackend;
pub use backends::{LumaBackend, StubBackend};
pub use detection::Detection;
pub use registry::{BackendLoader, BackendRegistry, DefaultLoader, SharedBackend, MODEL_EXTENSION};
