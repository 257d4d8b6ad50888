mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use common::*;
use shared::{TimePrecision, Timespec};

const READERS: usize = 4;

#[test]
fn test_legacy_clock_never_goes_backwards() {
    let time = legacy_time();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let mut last_uptime = Timespec::ZERO;
                let mut last_epoch = Timespec::ZERO;
                while !done.load(Ordering::Acquire) {
                    let uptime = time.monotonic_time(TimePrecision::Coarse);
                    let epoch = time.epoch_time(TimePrecision::Coarse);
                    assert!(uptime >= last_uptime, "{:?} < {:?}", uptime, last_uptime);
                    assert!(epoch >= last_epoch, "{:?} < {:?}", epoch, last_epoch);
                    last_uptime = uptime;
                    last_epoch = epoch;
                }
            });
        }

        time.set_remaining_epoch_time_adjustment(Timespec::from_nanos(-50_000_000));
        for _ in 0..20_000 {
            time.increment_time_since_boot();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(time.uptime_ms(), 20_000);
}

#[test]
fn test_precise_clock_never_goes_backwards() {
    let counter = FakeCounter::leaked(0);
    let time = hpet_time(counter);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let mut last = Timespec::ZERO;
                while !done.load(Ordering::Acquire) {
                    let now = time.monotonic_time(TimePrecision::Precise);
                    assert!(now >= last, "{:?} < {:?}", now, last);
                    last = now;
                }
            });
        }

        for _ in 0..20_000 {
            counter.advance(HPET_FREQUENCY / 1000 + 7);
            if counter.read_value() % 3 != 0 {
                time.increment_time_since_boot_hpet();
            }
        }
        done.store(true, Ordering::Release);
    });
}

#[test]
fn test_reader_never_sees_half_written_update() {
    let time = legacy_time();
    for _ in 0..999 {
        time.increment_time_since_boot();
    }
    let before = time.monotonic_time(TimePrecision::Coarse);
    let after = Timespec::from_secs(1);
    assert_eq!(before, Timespec::new(0, 999_000_000));

    let done = AtomicBool::new(false);
    let observed = thread::scope(|s| {
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                s.spawn(|| {
                    let mut seen = Vec::new();
                    while !done.load(Ordering::Acquire) {
                        let now = time.monotonic_time(TimePrecision::Coarse);
                        if seen.last() != Some(&now) {
                            seen.push(now);
                        }
                    }
                    seen
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        {
            // Stall between the two field stores
            let update = time.clock_state().begin_update();
            update.set_seconds_since_boot(1);
            thread::sleep(Duration::from_millis(20));
            update.set_ticks_this_second(0);
        }
        thread::sleep(Duration::from_millis(5));
        done.store(true, Ordering::Release);

        readers
            .into_iter()
            .flat_map(|reader| reader.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert!(observed.iter().all(|now| *now == before || *now == after), "{:?}", observed);
    assert!(observed.contains(&after));
}

#[test]
fn test_set_epoch_time_survives_concurrent_ticks() {
    const TICKS: usize = 10_000;
    let time = legacy_time();
    let base = BOOT_EPOCH + 1_000_000;

    let last_set = thread::scope(|s| {
        let ticker = s.spawn(|| {
            for _ in 0..TICKS {
                time.increment_time_since_boot();
            }
        });

        let mut last_set = Timespec::ZERO;
        for i in 0..TICKS as i64 {
            last_set = Timespec::from_secs(base + i);
            time.set_epoch_time(last_set);
            let epoch = time.epoch_time(TimePrecision::Coarse);
            assert!(epoch >= last_set, "{:?} lost, clock reads {:?}", last_set, epoch);
        }
        ticker.join().unwrap();
        last_set
    });

    let epoch = time.epoch_time(TimePrecision::Coarse);
    assert!(epoch >= last_set);
    assert!(epoch <= last_set + Timespec::from_secs(TICKS as i64 / 1000));
    assert_eq!(time.uptime_ms(), TICKS as u64);
}

#[test]
fn test_reader_waits_out_stalled_writer() {
    let time = legacy_time();
    let finished = AtomicBool::new(false);

    thread::scope(|s| {
        let update = time.clock_state().begin_update();
        let reader = s.spawn(|| {
            let now = time.monotonic_time(TimePrecision::Coarse);
            finished.store(true, Ordering::Release);
            now
        });

        update.set_seconds_since_boot(7);
        thread::sleep(Duration::from_millis(20));
        assert!(!finished.load(Ordering::Acquire));
        drop(update);

        assert_eq!(reader.join().unwrap(), Timespec::from_secs(7));
    });
}
