#[allow(clippy::module_inception)]
pub mod emitter;
pub mod error;
pub mod policy;
pub mod registry;

// Re-export commonly used types
pub use emitter::Emitter;
pub use error::EmitterError;
pub use policy::{Contain, ErrorLog, ErrorPolicy, Propagate};
pub use registry::{Handler, Registration, Registry, Slot};
