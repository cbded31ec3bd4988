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

//! Scoped ownership of a lock.
//!
//! A [`Locker`] releases the lock it holds when it goes out of scope, on every exit path
//! including early returns and unwinding.
//!
//! # Examples
//!
//! ```
//! # fn main() -> lockstep::Result<()> {
//! use lockstep::locker::Locker;
//! use lockstep::mutex::Mutex;
//!
//! let mutex = Mutex::new()?;
//! {
//!     let _locker = Locker::new(&mutex)?;
//!     assert!(!mutex.try_lock()?);
//! }
//! assert!(mutex.try_lock()?);
//! mutex.unlock()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::time::Duration;

use crate::fatal::fatality;
use crate::Result;

/// An exclusive lock that is acquired and released explicitly.
pub trait Lockable {
    /// Attempts to acquire the lock without blocking.
    fn try_lock(&self) -> Result<bool>;

    /// Blocks until the lock is acquired.
    fn lock(&self) -> Result<()>;

    /// Releases the lock held by the calling thread.
    fn unlock(&self) -> Result<()>;

    /// Attempts to acquire the lock, giving up after `timeout`.
    fn try_lock_for(&self, timeout: Duration) -> Result<bool>;
}

/// RAII structure holding a [`Lockable`] until dropped.
///
/// The lock must be released by the thread that acquired it, so a `Locker` cannot be sent to
/// another thread. Dropping a `Locker` whose release fails aborts the process; call
/// [`Locker::unlock`] to observe the error instead.
#[must_use = "if unused the lock will immediately unlock"]
pub struct Locker<'a, L: Lockable + ?Sized> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<L: Lockable + Sync + ?Sized> Sync for Locker<'_, L> {}

impl<'a, L: Lockable + ?Sized> Locker<'a, L> {
    fn acquired(lock: &'a L) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Blocks until `lock` is acquired.
    pub fn new(lock: &'a L) -> Result<Self> {
        lock.lock()?;
        Ok(Self::acquired(lock))
    }

    /// Acquires `lock` if it is free, returns `None` otherwise.
    pub fn try_new(lock: &'a L) -> Result<Option<Self>> {
        Ok(lock.try_lock()?.then(|| Self::acquired(lock)))
    }

    /// Acquires `lock`, returns `None` if it is still held elsewhere after `timeout`.
    pub fn try_new_for(lock: &'a L, timeout: Duration) -> Result<Option<Self>> {
        Ok(lock.try_lock_for(timeout)?.then(|| Self::acquired(lock)))
    }

    /// Releases the lock, reporting a failed release as an error.
    pub fn unlock(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.lock.unlock()
    }
}

impl<L: Lockable + ?Sized> Drop for Locker<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            fatality!(err);
        }
    }
}

impl<L: Lockable + ?Sized> fmt::Debug for Locker<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Records calls instead of locking.
    #[derive(Default)]
    struct Recorder {
        held: Cell<bool>,
        unlocks: Cell<usize>,
    }

    impl Lockable for Recorder {
        fn try_lock(&self) -> Result<bool> {
            Ok(!self.held.replace(true))
        }

        fn lock(&self) -> Result<()> {
            self.held.set(true);
            Ok(())
        }

        fn unlock(&self) -> Result<()> {
            self.held.set(false);
            self.unlocks.set(self.unlocks.get() + 1);
            Ok(())
        }

        fn try_lock_for(&self, _: Duration) -> Result<bool> {
            self.try_lock()
        }
    }

    #[test]
    fn test_release_on_drop() {
        let lock = Recorder::default();
        {
            let _locker = Locker::new(&lock).unwrap();
            assert!(lock.held.get());
            assert!(Locker::try_new(&lock).unwrap().is_none());
        }
        assert!(!lock.held.get());
        assert_eq!(lock.unlocks.get(), 1);
    }

    #[test]
    fn test_explicit_unlock_releases_once() {
        let lock = Recorder::default();
        let locker = Locker::try_new_for(&lock, Duration::from_millis(1))
            .unwrap()
            .unwrap();
        locker.unlock().unwrap();
        assert!(!lock.held.get());
        assert_eq!(lock.unlocks.get(), 1);
    }

    #[test]
    fn test_release_on_unwind() {
        let lock = Recorder::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _locker = Locker::new(&lock).unwrap();
            panic!("guarded code failed");
        }));
        assert!(result.is_err());
        assert!(!lock.held.get());
    }
}
