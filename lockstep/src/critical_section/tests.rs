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
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use super::*;

/// Runs `try_lock` on another thread, releasing again on success.
fn try_lock_elsewhere(cs: &CriticalSection) -> bool {
    std::thread::scope(|s| {
        s.spawn(|| {
            let acquired = cs.try_lock().unwrap();
            if acquired {
                cs.unlock().unwrap();
            }
            acquired
        })
        .join()
        .unwrap()
    })
}

#[test]
fn test_round_trip() {
    let cs = CriticalSection::new().unwrap();
    cs.lock().unwrap();
    cs.unlock().unwrap();
    assert!(cs.try_lock().unwrap());
    cs.unlock().unwrap();
    drop(cs);
}

#[test]
fn test_recursive_lock_needs_matching_unlocks() {
    const DEPTH: usize = 5;

    let cs = CriticalSection::new().unwrap();
    for _ in 0..DEPTH {
        cs.lock().unwrap();
    }
    assert!(cs.try_lock().unwrap());
    assert!(!try_lock_elsewhere(&cs));

    // One extra level from the try_lock above.
    for _ in 0..DEPTH {
        cs.unlock().unwrap();
        assert!(!try_lock_elsewhere(&cs));
    }

    cs.unlock().unwrap();
    assert!(try_lock_elsewhere(&cs));
}

#[test]
fn test_try_lock_fails_while_held_once() {
    let cs = CriticalSection::new().unwrap();
    cs.lock().unwrap();
    assert!(!try_lock_elsewhere(&cs));
    cs.unlock().unwrap();
    assert!(try_lock_elsewhere(&cs));
}

#[test]
fn test_unlock_requires_ownership() {
    let cs = CriticalSection::new().unwrap();
    assert!(cs.unlock().is_err());

    cs.lock().unwrap();
    std::thread::scope(|s| {
        s.spawn(|| assert!(cs.unlock().is_err()));
    });
    cs.unlock().unwrap();
}

#[test]
fn test_try_lock_for_uncontended_is_immediate() {
    let cs = CriticalSection::new().unwrap();
    let start = Instant::now();
    assert!(cs.try_lock_for(Duration::from_secs(10)).unwrap());
    assert!(start.elapsed() < Duration::from_secs(1));
    cs.unlock().unwrap();

    assert!(cs.try_lock_for(Duration::ZERO).unwrap());
    cs.unlock().unwrap();
}

#[test]
fn test_try_lock_for_times_out_while_held() {
    let timeout = Duration::from_millis(50);
    let cs = CriticalSection::new().unwrap();
    cs.lock().unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            let start = Instant::now();
            assert!(!cs.try_lock_for(timeout).unwrap());
            assert!(start.elapsed() >= timeout);

            let deadline = Instant::now() + timeout;
            assert!(!cs.try_lock_until(deadline).unwrap());
            assert!(Instant::now() >= deadline);
        });
    });

    // The failed attempts left nothing behind.
    cs.unlock().unwrap();
    assert!(try_lock_elsewhere(&cs));
}

#[test]
fn test_try_lock_for_acquires_once_released() {
    let cs = Arc::new(CriticalSection::new().unwrap());
    cs.lock().unwrap();

    let cs_clone = cs.clone();
    let handle = std::thread::spawn(move || {
        let acquired = cs_clone.try_lock_for(Duration::from_secs(10)).unwrap();
        if acquired {
            cs_clone.unlock().unwrap();
        }
        acquired
    });

    std::thread::sleep(Duration::from_millis(20));
    cs.unlock().unwrap();
    assert!(handle.join().unwrap());
}

#[test]
fn test_move_transfers_ownership() {
    let cs = CriticalSection::new().unwrap();
    cs.lock().unwrap();

    let moved = cs;
    moved.unlock().unwrap();

    let mut assigned = CriticalSection::new().unwrap();
    assigned.lock().unwrap();
    assigned.unlock().unwrap();
    assigned = moved;
    assigned.lock().unwrap();
    assigned.unlock().unwrap();
}

#[test]
fn test_timeout_is_traced_with_deadline() {
    let cs = CriticalSection::new().unwrap();
    cs.lock().unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            let fields = crate::traced_fields(|| {
                assert!(!cs.try_lock_for(Duration::from_millis(1)).unwrap());
            });
            assert!(fields.contains(&"deadline"), "{fields:?}");
        });
    });

    cs.unlock().unwrap();
}

struct UnsafeSendCell<T>(UnsafeCell<T>);
unsafe impl<T> Send for UnsafeSendCell<T> {}
unsafe impl<T> Sync for UnsafeSendCell<T> {}
impl<T> UnsafeSendCell<T> {
    fn new(t: T) -> Self {
        Self(UnsafeCell::new(t))
    }
    unsafe fn get(&self) -> *mut T {
        self.0.get()
    }
}

#[test]
fn test_multi_thread() {
    let cs = Arc::new(CriticalSection::new().unwrap());
    let counter = Arc::new(UnsafeSendCell::new(0_usize));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cs = cs.clone();
            let counter = counter.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let _locker = cs.locker().unwrap();
                    // Reentrant acquisition inside the guarded region.
                    let _inner = cs.locker().unwrap();
                    unsafe { *counter.get() += 1 };
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let _locker = cs.locker().unwrap();
    assert_eq!(unsafe { *counter.get() }, 4000);
}
