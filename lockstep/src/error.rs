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

use std::io;

/// A specialized [`Result`](std::result::Result) type for synchronization operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A recoverable failure reported by a native synchronization backend.
///
/// Busy locks and expired timeouts are never reported as an `Error`; they are the `false`
/// outcome of the `try_*` operations. An `Error` means the backend refused the operation, for
/// example because the calling thread does not own the lock it tries to release.
#[derive(Debug, thiserror::Error)]
#[error("{message}: {source}")]
pub struct Error {
    message: &'static str,
    #[source]
    source: io::Error,
}

impl Error {
    /// Creates an error from a native error code (`errno` on Unix, `GetLastError` on Windows).
    pub(crate) fn system(message: &'static str, code: i32) -> Self {
        Self {
            message,
            source: io::Error::from_raw_os_error(code),
        }
    }

    /// Returns the description of the failed operation.
    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Returns the native error code.
    pub fn code(&self) -> i32 {
        self.source.raw_os_error().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_system_message() {
        let err = Error::system("failed to lock a mutex", 22);
        assert_eq!(err.code(), 22);
        assert_eq!(err.message(), "failed to lock a mutex");

        let rendered = err.to_string();
        assert!(rendered.starts_with("failed to lock a mutex: "));
        assert!(rendered.contains("os error 22"), "{rendered}");
    }
}
