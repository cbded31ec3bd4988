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

//! Process termination for failures that cannot be reported to the caller.
//!
//! Releasing a native lock, condition variable or event handle happens in [`Drop`], where there
//! is nobody to return an error to. Such a release only fails when the primitive is corrupted or
//! still in use, so the process is terminated with a full diagnostic instead of continuing with
//! a lock in an unknown state.

use std::backtrace::Backtrace;
use std::io;
use std::io::Write;
use std::panic::Location;

/// Aborts the process when dropped, including while unwinding.
struct AbortOnDrop;

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        std::process::abort()
    }
}

/// Reports an unrecoverable error to stderr and aborts the process.
///
/// The report contains the message, the native error code together with its system
/// description, the source location and the stack trace. Failures to write the report are
/// ignored; the process is aborted regardless.
///
/// The report is written to stderr before the `tracing` event is emitted, and a panic raised by
/// a subscriber still ends in an abort.
pub fn fatal(location: &Location<'_>, trace: &Backtrace, message: &str, error: i32) -> ! {
    let _abort = AbortOnDrop;
    let description = io::Error::from_raw_os_error(error);

    {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "Fatal error: {message}");
        let _ = writeln!(stderr, "System error: {error}");
        let _ = writeln!(stderr, "System message: {description}");
        let _ = writeln!(stderr, "Source location: {location}");
        let _ = writeln!(stderr, "Stack trace: ");
        let _ = writeln!(stderr, "{trace}");
        let _ = stderr.flush();
    }

    tracing::error!(
        code = error,
        location = %location,
        system = %description,
        "fatal error: {message}"
    );

    std::process::abort()
}

/// Escalates an [`Error`](crate::Error) raised while dropping a primitive.
///
/// Only for use in `Drop` implementations.
macro_rules! fatality {
    ($err:expr) => {{
        let err: $crate::Error = $err;
        $crate::fatal::fatal(
            ::std::panic::Location::caller(),
            &::std::backtrace::Backtrace::force_capture(),
            err.message(),
            err.code(),
        )
    }};
}

pub(crate) use fatality;
