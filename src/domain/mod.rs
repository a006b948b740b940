pub mod envelope;
pub mod error;
pub mod ring_buffer;

// Re-export commonly used types
pub use envelope::{Envelope, EventData, EventType, extract};
pub use error::OperatorError;
pub use ring_buffer::RingBuffer;
