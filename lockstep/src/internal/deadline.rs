// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;
use std::time::Instant;

use crate::Result;

/// The point in monotonic time at which a bounded wait gives up.
///
/// `None` means the requested timeout overflowed the clock, so the wait is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// Samples the clock once and adds `timeout`.
    pub(crate) fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub(crate) const fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub(crate) fn has_expired(&self) -> bool {
        match self.0 {
            Some(instant) => Instant::now() >= instant,
            None => false,
        }
    }

    /// Returns the time left before the deadline, or `None` for an unbounded wait.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|instant| instant.saturating_duration_since(Instant::now()))
    }
}

/// Emulates a bounded lock acquisition with a non-blocking `try_lock`.
///
/// `try_lock` is attempted once up front, so an expired deadline still gets one chance. After
/// that, every failed attempt yields the rest of the time slice and retries until the deadline
/// passes. The wait may overshoot the deadline by one yield-and-retry cycle.
pub(crate) fn poll_until<F>(deadline: Deadline, mut try_lock: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    if try_lock()? {
        return Ok(true);
    }

    while !deadline.has_expired() {
        if try_lock()? {
            return Ok(true);
        }
        std::thread::yield_now();
    }

    Ok(false)
}
