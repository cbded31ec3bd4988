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

use windows::core::PCWSTR;
use windows::Win32::System::Threading::CreateEventW;
use windows::Win32::System::Threading::SetEvent;

use super::wait_object;
use super::wait_object_until;
use super::win32_error;
use super::OwnedHandle;
use super::INFINITE;
use crate::internal::Deadline;
use crate::Result;

/// An auto-reset event object.
///
/// `SetEvent` with no waiting thread leaves the object signaled until one thread waits.
pub(crate) struct RawEvent(OwnedHandle);

impl RawEvent {
    pub(crate) fn new(signaled: bool) -> Result<Self> {
        let handle = unsafe { CreateEventW(None, false, signaled, PCWSTR::null()) }
            .map_err(|err| win32_error("failed to create an auto-reset event", &err))?;
        Ok(Self(OwnedHandle(handle)))
    }

    pub(crate) fn wait(&self) -> Result<()> {
        wait_object(self.0 .0, INFINITE, "failed to wait for an auto-reset event")?;
        Ok(())
    }

    pub(crate) fn try_wait(&self) -> Result<bool> {
        wait_object(self.0 .0, 0, "failed to try wait for an auto-reset event")
    }

    pub(crate) fn try_wait_until(&self, deadline: Deadline) -> Result<bool> {
        wait_object_until(
            self.0 .0,
            deadline,
            "failed to try wait for an auto-reset event with the given timeout",
        )
    }

    pub(crate) fn signal(&self) -> Result<()> {
        unsafe { SetEvent(self.0 .0) }
            .map_err(|err| win32_error("failed to signal an auto-reset event", &err))
    }
}
