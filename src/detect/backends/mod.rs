pub mod luma;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use luma::LumaBackend;
pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
