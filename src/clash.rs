//! Overlap checks between time-bounded tasks.

use crate::model::{Period, Task};

/// Closed-interval intersection. Touching boundaries count as overlap.
pub fn intervals_overlap(a: Period, b: Period) -> bool {
    a.start() <= b.end() && b.start() <= a.end()
}

/// Whether two tasks compete for the same time.
///
/// Symmetric. A task without a clash window (a plain todo) never clashes.
pub fn clashes(a: &Task, b: &Task) -> bool {
    match (a.clash_window(), b.clash_window()) {
        (Some(x), Some(y)) => intervals_overlap(x, y),
        _ => false,
    }
}
