//! Port trait definitions.
//!
//! - IssueTracker: reading and mutating issues on the tracker
//! - Clock: current time, swappable in tests

pub mod clock;
pub mod issue_tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use issue_tracker::IssueTracker;
