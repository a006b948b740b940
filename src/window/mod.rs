pub mod clock;
pub mod timed;

// Re-export commonly used types
pub use clock::{Clock, ClockHandle, ManualClock, WallClock, make_wall_clock};
pub use timed::{MIN_RESOLUTION, TimedWindow};
