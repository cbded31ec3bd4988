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
use std::time::Duration;

use windows::core::PCWSTR;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::Foundation::GetLastError;
use windows::Win32::Foundation::ERROR_BUSY;
use windows::Win32::Foundation::ERROR_NOT_OWNER;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::CreateMutexW;
use windows::Win32::System::Threading::DeleteCriticalSection;
use windows::Win32::System::Threading::EnterCriticalSection;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::System::Threading::InitializeCriticalSection;
use windows::Win32::System::Threading::LeaveCriticalSection;
use windows::Win32::System::Threading::ReleaseMutex;
use windows::Win32::System::Threading::TryEnterCriticalSection;
use windows::Win32::System::Threading::WaitForSingleObject;
use windows::Win32::System::Threading::CRITICAL_SECTION;

use crate::fatal::fatality;
use crate::internal::Deadline;
use crate::internal::RawLock;
use crate::internal::TimedWait;
use crate::Error;
use crate::Result;

mod event;

pub(crate) use event::RawEvent;

const INFINITE: u32 = u32::MAX;

const WAIT_OBJECT_0: u32 = 0x0000_0000;
const WAIT_ABANDONED: u32 = 0x0000_0080;
const WAIT_TIMEOUT: u32 = 0x0000_0102;

fn win32_error(message: &'static str, err: &windows::core::Error) -> Error {
    let hresult = err.code().0;
    // HRESULT_FROM_WIN32 keeps the Win32 error code in the low word.
    let code = if (hresult as u32) & 0xFFFF_0000 == 0x8007_0000 {
        hresult & 0xFFFF
    } else {
        hresult
    };
    Error::system(message, code)
}

fn last_error(message: &'static str) -> Error {
    match unsafe { GetLastError() } {
        Ok(()) => Error::system(message, 0),
        Err(err) => win32_error(message, &err),
    }
}

/// Rounds up, so that a wait never ends before the requested duration.
fn millis_ceil(timeout: Duration) -> u32 {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    u32::try_from(millis).map_or(INFINITE - 1, |millis| millis.min(INFINITE - 1))
}

/// Waits for a kernel object; returns `Ok(false)` on timeout.
fn wait_object(handle: HANDLE, millis: u32, message: &'static str) -> Result<bool> {
    let result = unsafe { WaitForSingleObject(handle, millis) };
    match result.0 {
        WAIT_OBJECT_0 => Ok(true),
        // The previous owner exited without releasing; the ownership is ours now.
        WAIT_ABANDONED => {
            tracing::warn!("acquired a mutex abandoned by its previous owner");
            Ok(true)
        }
        WAIT_TIMEOUT => Ok(false),
        _ => Err(last_error(message)),
    }
}

// Waits re-arm on the monotonic deadline since the kernel timer may fire slightly early.
fn wait_object_until(handle: HANDLE, deadline: Deadline, message: &'static str) -> Result<bool> {
    let Some(mut remaining) = deadline.remaining() else {
        return wait_object(handle, INFINITE, message);
    };

    loop {
        if wait_object(handle, millis_ceil(remaining), message)? {
            return Ok(true);
        }
        match deadline.remaining() {
            Some(left) if !left.is_zero() => remaining = left,
            _ => return Ok(false),
        }
    }
}

/// A kernel object handle closed on drop.
struct OwnedHandle(HANDLE);

// Kernel object handles may be used and closed from any thread.
unsafe impl Send for OwnedHandle {}
unsafe impl Sync for OwnedHandle {}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Err(err) = unsafe { CloseHandle(self.0) } {
            fatality!(win32_error("failed to close a handle", &err));
        }
    }
}

/// A `CRITICAL_SECTION` at a stable heap address.
///
/// Critical sections have no timed acquisition, so the bounded wait is polled.
pub(crate) struct RawRecursiveLock {
    inner: Box<UnsafeCell<CRITICAL_SECTION>>,
}

unsafe impl Send for RawRecursiveLock {}
unsafe impl Sync for RawRecursiveLock {}

impl RawRecursiveLock {
    fn get(&self) -> *mut CRITICAL_SECTION {
        self.inner.get()
    }

    fn owner(&self) -> usize {
        let owner = unsafe { ptr::read_volatile(ptr::addr_of!((*self.get()).OwningThread)) };
        owner.0 as usize
    }
}

impl RawLock for RawRecursiveLock {
    fn new() -> Result<Self> {
        let inner = Box::new(UnsafeCell::new(CRITICAL_SECTION::default()));
        unsafe { InitializeCriticalSection(inner.get()) };
        Ok(Self { inner })
    }

    fn try_lock(&self) -> Result<bool> {
        Ok(unsafe { TryEnterCriticalSection(self.get()) }.as_bool())
    }

    fn lock(&self) -> Result<()> {
        unsafe { EnterCriticalSection(self.get()) };
        Ok(())
    }

    // Leaving a critical section owned by another thread is undefined, so check first.
    fn unlock(&self) -> Result<()> {
        if self.owner() != unsafe { GetCurrentThreadId() } as usize {
            return Err(Error::system(
                "failed to unlock a critical section",
                ERROR_NOT_OWNER.0 as i32,
            ));
        }
        unsafe { LeaveCriticalSection(self.get()) };
        Ok(())
    }
}

impl Drop for RawRecursiveLock {
    fn drop(&mut self) {
        if self.owner() != 0 {
            fatality!(Error::system(
                "failed to delete a critical section",
                ERROR_BUSY.0 as i32
            ));
        }
        unsafe { DeleteCriticalSection(self.get()) };
    }
}

/// A kernel mutex object.
///
/// Kernel mutexes are re-entrant for the owning thread.
pub(crate) struct RawMutex(OwnedHandle);

impl RawLock for RawMutex {
    const TIMED_WAIT: TimedWait = TimedWait::Native;

    fn new() -> Result<Self> {
        let handle = unsafe { CreateMutexW(None, false, PCWSTR::null()) }
            .map_err(|err| win32_error("failed to create a mutex", &err))?;
        Ok(Self(OwnedHandle(handle)))
    }

    fn try_lock(&self) -> Result<bool> {
        wait_object(self.0 .0, 0, "failed to try lock a mutex")
    }

    fn lock(&self) -> Result<()> {
        wait_object(self.0 .0, INFINITE, "failed to lock a mutex")?;
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        unsafe { ReleaseMutex(self.0 .0) }.map_err(|err| win32_error("failed to unlock a mutex", &err))
    }

    fn try_lock_until(&self, deadline: Deadline) -> Result<bool> {
        wait_object_until(
            self.0 .0,
            deadline,
            "failed to try lock a mutex for the given timeout",
        )
    }
}
