//! Multi-threaded access to a single attribute.

use scope_core::{Attribute, ContinuousAttribute, Listener, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_writers_are_serialized() {
    let attr = Arc::new(ContinuousAttribute::new(0, (0, 1_000_000)).unwrap());
    let in_pass = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let deliveries = Arc::new(AtomicUsize::new(0));

    let listener: Listener = {
        let in_pass = in_pass.clone();
        let overlaps = overlaps.clone();
        let deliveries = deliveries.clone();
        Arc::new(move |_v: &Value| {
            if in_pass.swap(true, Ordering::SeqCst) {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            deliveries.fetch_add(1, Ordering::SeqCst);
            thread::yield_now();
            in_pass.store(false, Ordering::SeqCst);
        })
    };
    attr.subscribe(&listener, false);

    let threads = 4;
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let attr = attr.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    // Distinct values per thread, so every set is a change.
                    attr.set((t * per_thread + i + 1) as i64).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(deliveries.load(Ordering::SeqCst), threads * per_thread);
}

#[test]
fn reads_are_never_torn() {
    let attr = Arc::new(Attribute::new(Value::tuple([0, 0])).unwrap());
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let attr = attr.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut i = 0i64;
            while !stop.load(Ordering::SeqCst) {
                i += 1;
                attr.set(Value::tuple([i, i])).unwrap();
            }
        })
    };

    for _ in 0..10_000 {
        let items: Vec<i64> = attr.get_as().unwrap();
        assert_eq!(items[0], items[1]);
    }
    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
}

#[test]
fn no_delivery_after_unsubscribe_returns() {
    let attr = Arc::new(Attribute::new(0).unwrap());
    let unsubscribed = Arc::new(AtomicBool::new(false));
    let late = Arc::new(AtomicUsize::new(0));

    let listener: Listener = {
        let unsubscribed = unsubscribed.clone();
        let late = late.clone();
        Arc::new(move |_v: &Value| {
            if unsubscribed.load(Ordering::SeqCst) {
                late.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_micros(50));
        })
    };
    let handle = attr.subscribe(&listener, false);

    let writer = {
        let attr = attr.clone();
        thread::spawn(move || {
            for i in 1..=500i64 {
                attr.set(i).unwrap();
            }
        })
    };

    thread::sleep(Duration::from_millis(2));
    attr.unsubscribe(handle);
    unsubscribed.store(true, Ordering::SeqCst);
    writer.join().unwrap();

    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[test]
fn reentrant_set_applies_in_order() {
    let attr = Arc::new(Attribute::new(0).unwrap());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    // Every odd value is immediately bumped to the next even one.
    let listener: Listener = {
        let weak = Arc::downgrade(&attr);
        let seen = seen.clone();
        Arc::new(move |v: &Value| {
            seen.lock().push(v.clone());
            if let (Some(attr), Value::Int(i)) = (weak.upgrade(), v) {
                if i % 2 == 1 {
                    attr.set(i + 1).unwrap();
                }
            }
        })
    };
    attr.subscribe(&listener, false);

    attr.set(3).unwrap();
    attr.set(4).unwrap();
    attr.set(7).unwrap();

    assert_eq!(attr.get(), Value::Int(8));
    assert_eq!(
        *seen.lock(),
        vec![Value::Int(3), Value::Int(4), Value::Int(7), Value::Int(8)]
    );
}

#[test]
fn reentrant_writer_blocks_other_threads_until_pass_ends() {
    let attr = Arc::new(Attribute::new(0).unwrap());
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let started = Arc::new(Barrier::new(2));

    let listener: Listener = {
        let order = order.clone();
        let started = started.clone();
        Arc::new(move |v: &Value| {
            if *v == Value::Int(1) {
                started.wait();
                thread::sleep(Duration::from_millis(20));
            }
            order.lock().push(v.clone());
        })
    };
    attr.subscribe(&listener, false);

    let first = {
        let attr = attr.clone();
        thread::spawn(move || attr.set(1).unwrap())
    };
    started.wait();
    attr.set(2).unwrap();
    first.join().unwrap();

    assert_eq!(*order.lock(), vec![Value::Int(1), Value::Int(2)]);
}
