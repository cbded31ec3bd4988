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

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use super::*;

#[test]
fn test_round_trip() {
    let event = Event::new().unwrap();
    event.signal().unwrap();
    event.wait().unwrap();
    drop(event);
}

#[test]
fn test_each_signal_releases_one_waiter() {
    const WAITERS: usize = 8;

    let event = Arc::new(Event::new().unwrap());
    let released = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WAITERS)
        .map(|i| {
            let event = event.clone();
            let released = released.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10 * i as u64));
                event.wait().unwrap();
                released.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(100));
    for n in 1..=WAITERS {
        event.signal().unwrap();
        // Signals may land before the waiter they are meant for blocks; wait for the release
        // so that no two of them collapse into one pending signal.
        while released.load(Ordering::SeqCst) < n {
            std::thread::yield_now();
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), WAITERS);
    assert!(!event.try_wait().unwrap());
}

#[test]
fn test_burst_of_signals_releases_every_waiter() {
    const WAITERS: usize = 8;

    let event = Arc::new(Event::new().unwrap());
    let released = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WAITERS)
        .map(|i| {
            let event = event.clone();
            let released = released.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10 * i as u64));
                event.wait().unwrap();
                released.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(100));
    for _ in 0..WAITERS {
        event.signal().unwrap();
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), WAITERS);
    assert!(!event.try_wait().unwrap());
}

#[test]
fn test_signal_without_waiters_is_latched() {
    let event = Event::new().unwrap();
    assert!(!event.try_wait().unwrap());

    event.signal().unwrap();
    assert!(event.try_wait().unwrap());
    assert!(!event.try_wait().unwrap());

    event.signal().unwrap();
    event.wait().unwrap();
    assert!(!event.try_wait().unwrap());

    event.signal().unwrap();
    let start = Instant::now();
    assert!(event.try_wait_for(Duration::from_secs(10)).unwrap());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_pending_signals_collapse() {
    let event = Event::new().unwrap();
    event.signal().unwrap();
    event.signal().unwrap();
    event.signal().unwrap();

    assert!(event.try_wait().unwrap());
    assert!(!event.try_wait().unwrap());
}

#[test]
fn test_try_wait_for_times_out() {
    let timeout = Duration::from_millis(50);
    let event = Event::new().unwrap();

    let start = Instant::now();
    assert!(!event.try_wait_for(timeout).unwrap());
    assert!(start.elapsed() >= timeout);

    let deadline = Instant::now() + timeout;
    assert!(!event.try_wait_until(deadline).unwrap());
    assert!(Instant::now() >= deadline);

    assert!(!event.try_wait_for(Duration::ZERO).unwrap());
}

#[test]
fn test_timeout_is_traced_with_deadline() {
    let event = Event::new().unwrap();
    let fields = crate::traced_fields(|| {
        assert!(!event.try_wait_for(Duration::from_millis(1)).unwrap());
    });
    assert!(fields.contains(&"deadline"), "{fields:?}");
}

#[test]
fn test_try_wait_for_receives_signal() {
    let event = Arc::new(Event::new().unwrap());
    let event_clone = event.clone();
    let handle =
        std::thread::spawn(move || event_clone.try_wait_for(Duration::from_secs(10)).unwrap());

    std::thread::sleep(Duration::from_millis(20));
    event.signal().unwrap();
    assert!(handle.join().unwrap());
    assert!(!event.try_wait().unwrap());
}

#[test]
fn test_with_signaled() {
    let event = Event::with_signaled(true).unwrap();
    assert!(event.try_wait().unwrap());
    assert!(!event.try_wait().unwrap());

    let event = Event::with_signaled(false).unwrap();
    assert!(!event.try_wait().unwrap());
}

#[test]
fn test_move_keeps_pending_signal() {
    let event = Event::new().unwrap();
    event.signal().unwrap();

    let moved = event;
    assert!(moved.try_wait().unwrap());

    let mut assigned = Event::with_signaled(true).unwrap();
    assert!(assigned.try_wait().unwrap());
    moved.signal().unwrap();
    assigned = moved;
    assert!(assigned.try_wait().unwrap());
    assert!(!assigned.try_wait().unwrap());
}
