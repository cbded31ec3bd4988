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

use slab::Slab;

/// Bookkeeping of an auto-reset event whose waiters block on a condition variable.
///
/// Each blocked thread owns one entry, which flips to `true` when a signal is handed to it. A
/// thread only leaves the wait once its own entry is notified, so a broadcast wakeup or a
/// spurious one never releases more threads than there were signals.
#[derive(Debug)]
pub(crate) struct WaiterSet {
    entries: Slab<bool>,
    /// Number of entries not notified yet.
    notifiable: usize,
    /// A signal delivered while nobody was waiting.
    signaled: bool,
}

impl WaiterSet {
    pub(crate) fn new(signaled: bool) -> Self {
        Self {
            entries: Slab::new(),
            notifiable: 0,
            signaled,
        }
    }

    /// Takes the pending signal, if any.
    pub(crate) fn try_consume(&mut self) -> bool {
        std::mem::take(&mut self.signaled)
    }

    /// Registers a blocked waiter and returns the key associated with it.
    pub(crate) fn insert(&mut self) -> usize {
        let key = self.entries.insert(false);
        self.notifiable += 1;
        key
    }

    /// If the waiter for this key has been notified, removes the entry and returns true.
    pub(crate) fn remove_if_notified(&mut self, key: usize) -> bool {
        if self.entries[key] {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Hands a signal to one blocked waiter, or keeps it pending if there is none.
    ///
    /// Returns `true` if a waiter was notified and must be woken up.
    pub(crate) fn signal(&mut self) -> bool {
        if self.notify_one() {
            true
        } else {
            self.signaled = true;
            false
        }
    }

    /// Removes the entry of a waiter that gives up.
    ///
    /// A signal already handed to that waiter is passed on. Returns `true` if another waiter was
    /// notified and must be woken up.
    pub(crate) fn cancel(&mut self, key: usize) -> bool {
        if self.entries.remove(key) {
            self.signal()
        } else {
            self.notifiable -= 1;
            false
        }
    }

    fn notify_one(&mut self) -> bool {
        if self.notifiable > 0 {
            for (_, notified) in self.entries.iter_mut() {
                if !*notified {
                    *notified = true;
                    self.notifiable -= 1;
                    return true;
                }
            }
        }
        false
    }
}
