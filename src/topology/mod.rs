//! Declarative wiring of several operators against one source type.
//!
//! ```rust,ignore
//! let emitter = Topology::new(&emitter, "readings")
//!     .with(builders::multicast(["archive", "alerts"]))
//!     .with(builders::multicast(["dashboard"]))
//!     .build()?;
//! ```
//!
//! Steps run in order and the first registration error aborts the build.
//! Later steps see the registrations made by earlier ones, so two
//! `multicast` steps on the same source union their targets while any other
//! repeat fails with `HandlerExists`.

pub mod builder;
pub mod builders;

// Re-export commonly used types
pub use builder::{Step, Topology, topology};
