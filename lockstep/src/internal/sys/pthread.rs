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
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use crate::fatal::fatality;
#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::internal::Deadline;
use crate::internal::RawLock;
#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::internal::TimedWait;
use crate::Error;
use crate::Result;

mod event;

pub(crate) use event::RawEvent;

const NANOS_PER_SEC: i64 = 1_000_000_000;

fn cvt(result: libc::c_int, message: &'static str) -> Result<()> {
    if result == 0 {
        Ok(())
    } else {
        Err(Error::system(message, result))
    }
}

/// Converts a timeout into the absolute `CLOCK_REALTIME` time pthread timed waits expect.
fn realtime_after(timeout: Duration) -> Result<libc::timespec> {
    let mut now = MaybeUninit::<libc::timespec>::uninit();
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, now.as_mut_ptr()) } != 0 {
        let code = io::Error::last_os_error().raw_os_error().unwrap_or_default();
        return Err(Error::system("failed to read the realtime clock", code));
    }
    let mut abstime = unsafe { now.assume_init() };

    let secs = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
    let mut sec = i64::from(abstime.tv_sec).saturating_add(secs);
    let mut nsec = i64::from(abstime.tv_nsec) + i64::from(timeout.subsec_nanos());
    if nsec >= NANOS_PER_SEC {
        nsec -= NANOS_PER_SEC;
        sec = sec.saturating_add(1);
    }

    abstime.tv_sec = sec.try_into().unwrap_or(libc::time_t::MAX);
    abstime.tv_nsec = nsec as _;
    Ok(abstime)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn sleep_until(deadline: Deadline) {
    while let Some(left) = deadline.remaining().filter(|left| !left.is_zero()) {
        std::thread::sleep(left);
    }
}

/// A `pthread_mutex_t` at a stable heap address.
pub(super) struct PthreadMutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

unsafe impl Send for PthreadMutex {}
unsafe impl Sync for PthreadMutex {}

impl PthreadMutex {
    fn with_kind(kind: libc::c_int) -> Result<Self> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        cvt(
            unsafe { libc::pthread_mutexattr_init(attr.as_mut_ptr()) },
            "failed to initialize a mutex attribute",
        )?;
        let attr = attr.as_mut_ptr();

        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        let initialized = cvt(
            unsafe { libc::pthread_mutexattr_settype(attr, kind) },
            "failed to set a mutex type attribute",
        )
        .and_then(|()| {
            cvt(
                unsafe { libc::pthread_mutex_init(inner.get(), attr) },
                "failed to initialize a mutex",
            )
        });
        let attr_destroyed = cvt(
            unsafe { libc::pthread_mutexattr_destroy(attr) },
            "failed to destroy a mutex attribute",
        );

        initialized?;
        let mutex = Self { inner };
        attr_destroyed?;
        Ok(mutex)
    }

    fn get(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }

    fn try_lock(&self) -> Result<bool> {
        match unsafe { libc::pthread_mutex_trylock(self.get()) } {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            err => Err(Error::system("failed to try lock a mutex", err)),
        }
    }

    fn lock(&self) -> Result<()> {
        cvt(
            unsafe { libc::pthread_mutex_lock(self.get()) },
            "failed to lock a mutex",
        )
    }

    fn unlock(&self) -> Result<()> {
        cvt(
            unsafe { libc::pthread_mutex_unlock(self.get()) },
            "failed to unlock a mutex",
        )
    }
}

impl Drop for PthreadMutex {
    fn drop(&mut self) {
        let result = unsafe { libc::pthread_mutex_destroy(self.get()) };
        if result != 0 {
            fatality!(Error::system("failed to destroy a mutex", result));
        }
    }
}

/// A recursive `pthread_mutex_t`.
///
/// A thread that does not own the lock gets `EPERM` from `unlock`.
pub(crate) struct RawRecursiveLock(PthreadMutex);

impl RawLock for RawRecursiveLock {
    fn new() -> Result<Self> {
        PthreadMutex::with_kind(libc::PTHREAD_MUTEX_RECURSIVE).map(Self)
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

/// An error-checking `pthread_mutex_t`.
///
/// Relocking from the owning thread fails with `EDEADLK` and unlocking from another thread
/// fails with `EPERM`.
pub(crate) struct RawMutex(PthreadMutex);

impl RawLock for RawMutex {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    const TIMED_WAIT: TimedWait = TimedWait::Native;

    fn new() -> Result<Self> {
        PthreadMutex::with_kind(libc::PTHREAD_MUTEX_ERRORCHECK).map(Self)
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

    // The absolute timeout is on the realtime clock. If that clock jumps forward the native
    // call times out early, so the monotonic deadline decides whether to wait again.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn try_lock_until(&self, deadline: Deadline) -> Result<bool> {
        let Some(mut remaining) = deadline.remaining() else {
            self.lock()?;
            return Ok(true);
        };

        loop {
            let abstime = realtime_after(remaining)?;
            match unsafe { libc::pthread_mutex_timedlock(self.0.get(), &abstime) } {
                0 => return Ok(true),
                libc::ETIMEDOUT => match deadline.remaining() {
                    Some(left) if !left.is_zero() => remaining = left,
                    _ => return Ok(false),
                },
                // The caller owns the mutex, so it cannot be released before the deadline.
                libc::EDEADLK => {
                    sleep_until(deadline);
                    return Ok(false);
                }
                err => {
                    return Err(Error::system(
                        "failed to try lock a mutex for the given timeout",
                        err,
                    ))
                }
            }
        }
    }
}
