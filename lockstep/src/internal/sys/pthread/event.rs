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

use std::cell::UnsafeCell;
use std::ptr;

use super::cvt;
use super::realtime_after;
use super::PthreadMutex;
use crate::fatal::fatality;
use crate::internal::Deadline;
use crate::internal::WaiterSet;
use crate::Error;
use crate::Result;

/// A `pthread_cond_t` at a stable heap address.
struct PthreadCond {
    inner: Box<UnsafeCell<libc::pthread_cond_t>>,
}

impl PthreadCond {
    fn new() -> Result<Self> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        cvt(
            unsafe { libc::pthread_cond_init(inner.get(), ptr::null()) },
            "failed to initialize a condition variable",
        )?;
        Ok(Self { inner })
    }

    fn get(&self) -> *mut libc::pthread_cond_t {
        self.inner.get()
    }

    fn wait(&self, mutex: &PthreadMutex) -> Result<()> {
        cvt(
            unsafe { libc::pthread_cond_wait(self.get(), mutex.get()) },
            "failed to wait for a condition variable",
        )
    }

    /// Returns once woken up or once `abstime` has passed.
    fn wait_until(&self, mutex: &PthreadMutex, abstime: &libc::timespec) -> Result<()> {
        match unsafe { libc::pthread_cond_timedwait(self.get(), mutex.get(), abstime) } {
            0 | libc::ETIMEDOUT => Ok(()),
            err => Err(Error::system(
                "failed to wait for a condition variable with a timeout",
                err,
            )),
        }
    }

    fn broadcast(&self) -> Result<()> {
        cvt(
            unsafe { libc::pthread_cond_broadcast(self.get()) },
            "failed to broadcast a condition variable",
        )
    }
}

impl Drop for PthreadCond {
    fn drop(&mut self) {
        let result = unsafe { libc::pthread_cond_destroy(self.get()) };
        if result != 0 {
            fatality!(Error::system("failed to destroy a condition variable", result));
        }
    }
}

/// An auto-reset event built from a mutex, a condition variable and a [`WaiterSet`].
pub(crate) struct RawEvent {
    waiters: UnsafeCell<WaiterSet>,
    cond: PthreadCond,
    mutex: PthreadMutex,
}

unsafe impl Send for RawEvent {}
unsafe impl Sync for RawEvent {}

impl RawEvent {
    pub(crate) fn new(signaled: bool) -> Result<Self> {
        Ok(Self {
            waiters: UnsafeCell::new(WaiterSet::new(signaled)),
            cond: PthreadCond::new()?,
            mutex: PthreadMutex::with_kind(libc::PTHREAD_MUTEX_NORMAL)?,
        })
    }

    /// # Safety
    ///
    /// The mutex must be held, and the returned reference must be dropped before waiting on the
    /// condition variable or releasing the mutex.
    #[allow(clippy::mut_from_ref)]
    unsafe fn waiters(&self) -> &mut WaiterSet {
        unsafe { &mut *self.waiters.get() }
    }

    /// Runs `f` with the mutex held.
    fn locked<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.mutex.lock()?;
        let result = f();
        let unlocked = self.mutex.unlock();
        result.and_then(|r| unlocked.map(|()| r))
    }

    pub(crate) fn wait(&self) -> Result<()> {
        self.locked(|| self.wait_locked())
    }

    pub(crate) fn try_wait(&self) -> Result<bool> {
        self.locked(|| Ok(unsafe { self.waiters() }.try_consume()))
    }

    pub(crate) fn try_wait_until(&self, deadline: Deadline) -> Result<bool> {
        self.locked(|| self.wait_until_locked(deadline))
    }

    pub(crate) fn signal(&self) -> Result<()> {
        self.locked(|| {
            if unsafe { self.waiters() }.signal() {
                self.cond.broadcast()?;
            }
            Ok(())
        })
    }

    fn wait_locked(&self) -> Result<()> {
        if unsafe { self.waiters() }.try_consume() {
            return Ok(());
        }

        let key = unsafe { self.waiters() }.insert();
        loop {
            if let Err(err) = self.cond.wait(&self.mutex) {
                self.abandon(key)?;
                return Err(err);
            }
            if unsafe { self.waiters() }.remove_if_notified(key) {
                return Ok(());
            }
        }
    }

    fn wait_until_locked(&self, deadline: Deadline) -> Result<bool> {
        if unsafe { self.waiters() }.try_consume() {
            return Ok(true);
        }

        let Some(mut remaining) = deadline.remaining() else {
            self.wait_locked()?;
            return Ok(true);
        };
        if remaining.is_zero() {
            return Ok(false);
        }

        let key = unsafe { self.waiters() }.insert();
        loop {
            let waited = realtime_after(remaining)
                .and_then(|abstime| self.cond.wait_until(&self.mutex, &abstime));
            if let Err(err) = waited {
                self.abandon(key)?;
                return Err(err);
            }

            // A signal handed over right at the deadline still counts.
            if unsafe { self.waiters() }.remove_if_notified(key) {
                return Ok(true);
            }

            match deadline.remaining() {
                Some(left) if !left.is_zero() => remaining = left,
                _ => {
                    self.abandon(key)?;
                    return Ok(false);
                }
            }
        }
    }

    fn abandon(&self, key: usize) -> Result<()> {
        if unsafe { self.waiters() }.cancel(key) {
            self.cond.broadcast()?;
        }
        Ok(())
    }
}
