//! Remote debug sessions.

pub mod breakpoint;
pub mod session;

pub use breakpoint::BreakpointSet;
pub use session::{DebugSession, DebugState};
