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

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Blocking synchronization primitives over the native locks of the host platform.
//!
//! * [`CriticalSection`](critical_section::CriticalSection): a reentrant lock.
//! * [`Mutex`](mutex::Mutex): a non-reentrant lock with a native timed acquisition where the
//!   platform offers one.
//! * [`Event`](event::Event): an auto-reset event.
//! * [`Locker`](locker::Locker): a guard releasing any of the locks on scope exit.
//!
//! Every primitive behaves the same on POSIX and Windows. Operations report a busy lock or an
//! expired timeout as `Ok(false)` and a refusal of the native backend as an [`Error`]. Failures
//! during drop, where no error can be returned, terminate the process through
//! [`fatal::fatal`].
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber to observe them.

mod error;
mod internal;

pub mod critical_section;
pub mod event;
pub mod fatal;
pub mod locker;
pub mod mutex;

pub use error::Error;
pub use error::Result;
pub use internal::TimedWait;

/// Runs `f` on the current thread and returns the names of the fields on every `tracing` event
/// it emits.
#[cfg(test)]
fn traced_fields(f: impl FnOnce()) -> Vec<&'static str> {
    use std::sync::Arc;
    use std::sync::Mutex;

    use tracing::field::Field;
    use tracing::field::Visit;
    use tracing::span;
    use tracing::Event;
    use tracing::Metadata;
    use tracing::Subscriber;

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    struct Names(Vec<&'static str>);

    impl Visit for Names {
        fn record_debug(&mut self, field: &Field, _: &dyn std::fmt::Debug) {
            self.0.push(field.name());
        }
    }

    impl Subscriber for Recorder {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &span::Attributes<'_>) -> span::Id {
            span::Id::from_u64(1)
        }

        fn record(&self, _: &span::Id, _: &span::Record<'_>) {}

        fn record_follows_from(&self, _: &span::Id, _: &span::Id) {}

        fn event(&self, event: &Event<'_>) {
            let mut names = Names(Vec::new());
            event.record(&mut names);
            self.0.lock().unwrap().extend(names.0);
        }

        fn enter(&self, _: &span::Id) {}

        fn exit(&self, _: &span::Id) {}
    }

    let fields = Arc::new(Mutex::new(Vec::new()));
    tracing::subscriber::with_default(Recorder(fields.clone()), f);
    let recorded = fields.lock().unwrap().clone();
    recorded
}
