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

//! A reentrant lock for exclusive access within a process.
//!
//! The thread owning a [`CriticalSection`] may lock it again without blocking itself; the lock
//! is released for other threads once every [`lock`] has been matched by an [`unlock`].
//!
//! No platform offers a timed acquisition for its reentrant lock, so [`try_lock_for`] retries
//! [`try_lock`] and yields the thread in between until the timeout passes.
//!
//! # Examples
//!
//! ```
//! # fn main() -> lockstep::Result<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lockstep::critical_section::CriticalSection;
//!
//! let cs = Arc::new(CriticalSection::new()?);
//! cs.lock()?;
//! cs.lock()?;
//!
//! let cs_clone = cs.clone();
//! let acquired = std::thread::spawn(move || cs_clone.try_lock_for(Duration::from_millis(10)))
//!     .join()
//!     .unwrap()?;
//! assert!(!acquired);
//!
//! cs.unlock()?;
//! cs.unlock()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`lock`]: CriticalSection::lock
//! [`unlock`]: CriticalSection::unlock
//! [`try_lock`]: CriticalSection::try_lock
//! [`try_lock_for`]: CriticalSection::try_lock_for

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use crate::internal::poll_until;
use crate::internal::sys::RawRecursiveLock;
use crate::internal::Deadline;
use crate::internal::RawLock;
use crate::internal::TimedWait;
use crate::locker::Lockable;
use crate::locker::Locker;
use crate::Result;

#[cfg(test)]
mod tests;

/// A reentrant lock.
///
/// See the [module level documentation](self) for more.
pub struct CriticalSection {
    raw: RawRecursiveLock,
}

impl fmt::Debug for CriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriticalSection").finish_non_exhaustive()
    }
}

impl CriticalSection {
    /// Bounded waits on a critical section are always polled.
    pub const TIMED_WAIT: TimedWait = TimedWait::Polled;

    /// Creates a new critical section in an unlocked state.
    pub fn new() -> Result<Self> {
        let raw = RawRecursiveLock::new()?;
        Ok(Self { raw })
    }

    /// Attempts to acquire the critical section without blocking.
    ///
    /// Returns `Ok(false)` if another thread holds it. The owning thread always succeeds.
    pub fn try_lock(&self) -> Result<bool> {
        self.raw.try_lock()
    }

    /// Blocks the current thread until the critical section is acquired.
    ///
    /// If the current thread already owns it, the recursion count is incremented.
    pub fn lock(&self) -> Result<()> {
        self.raw.lock()
    }

    /// Releases one level of ownership.
    ///
    /// Fails if the current thread does not own the critical section.
    pub fn unlock(&self) -> Result<()> {
        self.raw.unlock()
    }

    /// Attempts to acquire the critical section, giving up once `timeout` has elapsed.
    ///
    /// One attempt is always made, even for a zero `timeout`. Returning `Ok(false)` leaves the
    /// critical section untouched.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.poll(Deadline::after(timeout))
    }

    /// Attempts to acquire the critical section, giving up once `deadline` has passed.
    pub fn try_lock_until(&self, deadline: Instant) -> Result<bool> {
        self.poll(Deadline::at(deadline))
    }

    /// Acquires the critical section and returns a [`Locker`] that releases it on drop.
    pub fn locker(&self) -> Result<Locker<'_, Self>> {
        Locker::new(self)
    }

    fn poll(&self, deadline: Deadline) -> Result<bool> {
        let acquired = poll_until(deadline, || self.raw.try_lock())?;
        if !acquired {
            tracing::trace!(deadline = ?deadline, "timed out acquiring a critical section");
        }
        Ok(acquired)
    }
}

impl Lockable for CriticalSection {
    fn try_lock(&self) -> Result<bool> {
        CriticalSection::try_lock(self)
    }

    fn lock(&self) -> Result<()> {
        CriticalSection::lock(self)
    }

    fn unlock(&self) -> Result<()> {
        CriticalSection::unlock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        CriticalSection::try_lock_for(self, timeout)
    }
}
