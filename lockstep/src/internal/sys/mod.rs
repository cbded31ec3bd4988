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

//! Platform backends.
//!
//! * `pthread`: recursive and error-checking `pthread_mutex_t`, plus a mutex and condition
//!   variable pair for events. `pthread_mutex_timedlock` is used where the platform has it.
//! * `win32`: `CRITICAL_SECTION`, kernel mutex and auto-reset event objects.

#[cfg(unix)]
mod pthread;
#[cfg(unix)]
pub(crate) use pthread::RawEvent;
#[cfg(unix)]
use pthread::RawMutex as NativeMutex;
#[cfg(unix)]
pub(crate) use pthread::RawRecursiveLock;

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub(crate) use win32::RawEvent;
#[cfg(windows)]
use win32::RawMutex as NativeMutex;
#[cfg(windows)]
pub(crate) use win32::RawRecursiveLock;

#[cfg(not(any(unix, windows)))]
compile_error!("lockstep supports only unix and windows targets");

#[cfg(not(feature = "poll-timeouts"))]
pub(crate) type RawMutex = NativeMutex;

#[cfg(feature = "poll-timeouts")]
pub(crate) type RawMutex = super::Polled<NativeMutex>;
