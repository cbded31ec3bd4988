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

//! Native lock backends and the algorithms that give them a uniform contract.
//!
//! Every public primitive owns exactly one raw backend value from [`sys`]. The backend is picked
//! at compile time, once, in [`sys`]; the public types never branch on the platform.

mod deadline;
pub(crate) mod sys;
#[cfg(unix)]
mod waiterset;

pub(crate) use deadline::poll_until;
pub(crate) use deadline::Deadline;
#[cfg(unix)]
pub(crate) use waiterset::WaiterSet;

use crate::Result;

/// How a primitive honors a bounded wait such as `try_lock_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimedWait {
    /// The native backend blocks with a timeout; no CPU is spent while waiting.
    Native,
    /// The wait is emulated by retrying a non-blocking attempt and yielding in between. The
    /// wait may overshoot the timeout by one retry cycle.
    Polled,
}

/// A raw exclusive lock over a native handle.
///
/// Implementations without a native timed acquisition keep the default [`try_lock_until`],
/// which polls.
///
/// [`try_lock_until`]: RawLock::try_lock_until
pub(crate) trait RawLock: Sized {
    const TIMED_WAIT: TimedWait = TimedWait::Polled;

    fn new() -> Result<Self>;

    /// Returns `Ok(false)` if the lock is held elsewhere.
    fn try_lock(&self) -> Result<bool>;

    fn lock(&self) -> Result<()>;

    /// Fails if the calling thread does not hold the lock.
    fn unlock(&self) -> Result<()>;

    /// An unbounded `deadline` blocks in [`lock`](RawLock::lock).
    fn try_lock_until(&self, deadline: Deadline) -> Result<bool> {
        if deadline.remaining().is_none() {
            self.lock()?;
            return Ok(true);
        }
        poll_until(deadline, || self.try_lock())
    }
}

/// Hides the native timed acquisition of `L`, leaving only the polled one.
#[cfg_attr(not(feature = "poll-timeouts"), allow(dead_code))]
pub(crate) struct Polled<L>(L);

impl<L: RawLock> RawLock for Polled<L> {
    fn new() -> Result<Self> {
        L::new().map(Polled)
    }

    fn try_lock(&self) -> Result<bool> {
        self.0.try_lock()
    }

    fn lock(&self) -> Result<()> {
        self.0.lock()
    }

    fn unlock(&self) -> Result<()> {
        self.0.unlock()
    }
}
