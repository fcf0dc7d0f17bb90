//! Wall-clock budget helpers for the session deadline.

use std::time::{Duration, Instant};

/// Time left until `deadline`, zero once it has passed.
pub fn remaining_budget(deadline: Instant) -> Duration {
    deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::ZERO)
}

/// True once the current time is at or past `deadline`.
pub fn deadline_reached(deadline: Instant) -> bool {
    remaining_budget(deadline).is_zero()
}
