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

//! A non-reentrant lock with bounded-wait acquisition.
//!
//! Unlike [`CriticalSection`], a [`Mutex`] must not be locked again by the thread that owns it.
//! On POSIX targets such an attempt fails with an error; on Windows the native mutex lets it
//! through. Code must not rely on either outcome.
//!
//! [`try_lock_for`] blocks in the native timed acquisition when the platform has one, so no
//! CPU is spent while waiting. See [`Mutex::TIMED_WAIT`] for the strategy in use.
//!
//! # Examples
//!
//! ```
//! # fn main() -> lockstep::Result<()> {
//! use std::time::Duration;
//!
//! use lockstep::mutex::Mutex;
//!
//! let mutex = Mutex::new()?;
//! assert!(mutex.try_lock_for(Duration::from_millis(10))?);
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| assert!(!mutex.try_lock_for(Duration::from_millis(10)).unwrap()));
//! });
//!
//! mutex.unlock()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`CriticalSection`]: crate::critical_section::CriticalSection
//! [`try_lock_for`]: Mutex::try_lock_for

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use crate::internal::sys::RawMutex;
use crate::internal::Deadline;
use crate::internal::RawLock;
use crate::internal::TimedWait;
use crate::locker::Lockable;
use crate::locker::Locker;
use crate::Result;


/// A non-reentrant lock.
///
/// See the [module level documentation](self) for more.
pub struct Mutex {
    raw: RawMutex,
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("timed_wait", &Self::TIMED_WAIT)
            .finish_non_exhaustive()
    }
}

impl Mutex {
    /// How [`try_lock_for`](Mutex::try_lock_for) waits on this platform.
    pub const TIMED_WAIT: TimedWait = <RawMutex as RawLock>::TIMED_WAIT;

    /// Creates a new mutex in an unlocked state.
    pub fn new() -> Result<Self> {
        let raw = RawMutex::new()?;
        Ok(Self { raw })
    }

    /// Attempts to acquire the mutex without blocking.
    ///
    /// Returns `Ok(false)` if the mutex is held, including by the current thread.
    pub fn try_lock(&self) -> Result<bool> {
        self.raw.try_lock()
    }

    /// Blocks the current thread until the mutex is acquired.
    pub fn lock(&self) -> Result<()> {
        self.raw.lock()
    }

    /// Releases the mutex.
    ///
    /// Fails if the current thread does not own the mutex.
    pub fn unlock(&self) -> Result<()> {
        self.raw.unlock()
    }

    /// Attempts to acquire the mutex, giving up once `timeout` has elapsed.
    ///
    /// Never reports a timeout before `timeout` has elapsed on the monotonic clock, even if the
    /// native call measures time on an adjustable clock.
    ///
    /// Where relocking by the owner is refused, an attempt by the owner waits out `timeout` and
    /// returns `Ok(false)`, as if another thread held the mutex, whatever [`TIMED_WAIT`] is. A
    /// timeout too large to represent waits like [`lock`](Mutex::lock) instead.
    ///
    /// [`TIMED_WAIT`]: Mutex::TIMED_WAIT
    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.wait(Deadline::after(timeout))
    }

    /// Attempts to acquire the mutex, giving up once `deadline` has passed.
    pub fn try_lock_until(&self, deadline: Instant) -> Result<bool> {
        self.wait(Deadline::at(deadline))
    }

    /// Acquires the mutex and returns a [`Locker`] that releases it on drop.
    pub fn locker(&self) -> Result<Locker<'_, Self>> {
        Locker::new(self)
    }

    fn wait(&self, deadline: Deadline) -> Result<bool> {
        let acquired = self.raw.try_lock_until(deadline)?;
        if !acquired {
            tracing::trace!(
                strategy = ?Self::TIMED_WAIT,
                deadline = ?deadline,
                "timed out acquiring a mutex"
            );
        }
        Ok(acquired)
    }
}

impl Lockable for Mutex {
    fn try_lock(&self) -> Result<bool> {
        Mutex::try_lock(self)
    }

    fn lock(&self) -> Result<()> {
        Mutex::lock(self)
    }

    fn unlock(&self) -> Result<()> {
        Mutex::unlock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        Mutex::try_lock_for(self, timeout)
    }
}
