pub mod clock;
pub mod config;
pub mod controller;
pub mod events;
pub mod state;
mod worker;

pub use clock::{Clock, ManualClock, Stopwatch, SystemClock};
pub use config::TimerConfig;
pub use controller::SessionTimer;
pub use events::{LiveStats, SessionEvent};
pub use state::{PauseKind, SessionState, TimerStatus};
