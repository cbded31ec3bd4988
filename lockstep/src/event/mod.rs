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

//! An auto-reset event for handing wakeups from one thread to another.
//!
//! Each [`signal`] releases exactly one thread blocked in [`wait`] or [`try_wait_for`]. A signal
//! delivered while no thread is waiting stays pending and is consumed by the next wait; further
//! signals before that wait collapse into the same pending one.
//!
//! # Examples
//!
//! ```
//! # fn main() -> lockstep::Result<()> {
//! use std::sync::Arc;
//!
//! use lockstep::event::Event;
//!
//! let event = Arc::new(Event::new()?);
//! let event_clone = event.clone();
//! let handle = std::thread::spawn(move || event_clone.wait());
//!
//! event.signal()?;
//! handle.join().unwrap()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`signal`]: Event::signal
//! [`wait`]: Event::wait
//! [`try_wait_for`]: Event::try_wait_for

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use crate::internal::sys::RawEvent;
use crate::internal::Deadline;
use crate::Result;

#[cfg(test)]
mod tests;

/// An auto-reset event.
///
/// See the [module level documentation](self) for more.
pub struct Event {
    raw: RawEvent,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").finish_non_exhaustive()
    }
}

impl Event {
    /// Creates a new event with no pending signal.
    pub fn new() -> Result<Self> {
        Self::with_signaled(false)
    }

    /// Creates a new event, with one pending signal if `signaled` is true.
    pub fn with_signaled(signaled: bool) -> Result<Self> {
        let raw = RawEvent::new(signaled)?;
        Ok(Self { raw })
    }

    /// Blocks the current thread until a signal is received.
    pub fn wait(&self) -> Result<()> {
        self.raw.wait()
    }

    /// Consumes a pending signal without blocking.
    ///
    /// Returns `Ok(false)` if there is none.
    pub fn try_wait(&self) -> Result<bool> {
        self.raw.try_wait()
    }

    /// Waits for a signal, giving up once `timeout` has elapsed.
    ///
    /// Returns `Ok(false)` on timeout, which is never reported before `timeout` has elapsed.
    pub fn try_wait_for(&self, timeout: Duration) -> Result<bool> {
        self.wait_until(Deadline::after(timeout))
    }

    /// Waits for a signal, giving up once `deadline` has passed.
    pub fn try_wait_until(&self, deadline: Instant) -> Result<bool> {
        self.wait_until(Deadline::at(deadline))
    }

    /// Releases one waiting thread, or leaves the signal pending if no thread waits.
    pub fn signal(&self) -> Result<()> {
        self.raw.signal()
    }

    fn wait_until(&self, deadline: Deadline) -> Result<bool> {
        let signaled = self.raw.try_wait_until(deadline)?;
        if !signaled {
            tracing::trace!(deadline = ?deadline, "timed out waiting for an event");
        }
        Ok(signaled)
    }
}
