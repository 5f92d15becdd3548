pub mod amplitude;
pub mod backend;
pub mod file;

pub use amplitude::AmplitudeMonitor;
pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame};
pub use file::{AudioFile, FileBackend};
