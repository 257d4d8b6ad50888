//! Clock state and its lock-free update protocol
//!
//! The clock is a sequence lock built from two counters. A writer bumps
//! `update_sequence_a` before touching any field and publishes the same value
//! in `update_sequence_b` once done, so the counters differ exactly while an
//! update is in flight.
//!
//! Readers sample `update_sequence_b` first and `update_sequence_a` last. Any
//! update that overlaps the copy either was already in flight (so the first
//! sample lags `a`) or started during it (so `a` moved past the first sample);
//! in both cases the samples differ and the copy is retried. Neither side ever
//! blocks, so the clock can be read from interrupt handlers on any CPU.
//!
//! Writers are serialized among themselves: a writer only opens its bracket by
//! moving `update_sequence_a` from the published value, so a second writer
//! spins until the first publishes. Readers are never held up by this.
//!
//! Every field is an atomic accessed with relaxed ordering; the fences around
//! the counters carry the acquire/release pairing.

use core::sync::atomic::{fence, AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use shared::{Timespec, NANOS_PER_SECOND};

/// Consistent copy of every clock field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockSnapshot {
    /// Whole seconds of monotonic uptime
    pub seconds_since_boot: u64,
    /// Time-keeper ticks into the current second
    pub ticks_this_second: u32,
    /// Wall-clock estimate
    pub epoch_time: Timespec,
    /// Correction still to be slewed into `epoch_time`
    pub remaining_epoch_adjustment: Timespec,
    /// HPET main counter value `seconds_since_boot`/`ticks_this_second` were
    /// computed from (unused by the legacy path)
    pub counter_at_last_update: u64,
    /// Rate `ticks_this_second` counts at
    pub ticks_per_second: u64,
}

impl ClockSnapshot {
    /// Advance by one nominal time-keeper tick, slewing at most 1% of the tick
    /// towards `remaining_epoch_adjustment`
    pub fn advance_nominal_tick(&mut self, nominal_tick_ns: i64, ticks_per_second: u64) {
        let max_slew_ns = nominal_tick_ns / 100;
        let slew_ns = slew_step(self.remaining_epoch_adjustment, max_slew_ns);

        self.ticks_per_second = ticks_per_second;
        self.remaining_epoch_adjustment -= Timespec::from_nanos(slew_ns);
        self.epoch_time += Timespec::from_nanos(nominal_tick_ns + slew_ns);

        self.ticks_this_second += 1;
        if self.ticks_this_second as u64 >= ticks_per_second {
            // FIXME: legacy timers on different CPUs are not kept in step
            self.seconds_since_boot += 1;
            self.ticks_this_second = 0;
        }
    }
}

/// Portion of `remaining` to apply this tick, bounded by `max_slew_ns` in
/// either direction
///
/// Seconds are clamped to ±1 first so the nanosecond sum cannot overflow.
pub fn slew_step(remaining: Timespec, max_slew_ns: i64) -> i64 {
    let nanos = remaining.seconds.clamp(-1, 1) * NANOS_PER_SECOND + remaining.nanoseconds as i64;
    nanos.clamp(-max_slew_ns, max_slew_ns)
}

/// Shared clock fields guarded by the two-counter sequence lock
#[derive(Debug)]
pub struct ClockState {
    update_sequence_a: AtomicU32,
    update_sequence_b: AtomicU32,
    seconds_since_boot: AtomicU64,
    ticks_this_second: AtomicU32,
    epoch_seconds: AtomicI64,
    epoch_nanoseconds: AtomicI32,
    adjustment_seconds: AtomicI64,
    adjustment_nanoseconds: AtomicI32,
    counter_at_last_update: AtomicU64,
    ticks_per_second: AtomicU64,
}

impl ClockState {
    pub const fn new() -> Self {
        Self {
            update_sequence_a: AtomicU32::new(0),
            update_sequence_b: AtomicU32::new(0),
            seconds_since_boot: AtomicU64::new(0),
            ticks_this_second: AtomicU32::new(0),
            epoch_seconds: AtomicI64::new(0),
            epoch_nanoseconds: AtomicI32::new(0),
            adjustment_seconds: AtomicI64::new(0),
            adjustment_nanoseconds: AtomicI32::new(0),
            counter_at_last_update: AtomicU64::new(0),
            ticks_per_second: AtomicU64::new(0),
        }
    }

    /// Consistent snapshot of all fields
    pub fn read(&self) -> ClockSnapshot {
        self.read_with(|_| ()).0
    }

    /// Take a snapshot and run `observe` against it inside the retry loop
    ///
    /// `observe` may re-run; whatever it reads (e.g. a live hardware counter)
    /// is only returned together with a snapshot no update overlapped.
    pub fn read_with<R>(&self, mut observe: impl FnMut(&ClockSnapshot) -> R) -> (ClockSnapshot, R) {
        loop {
            let published = self.update_sequence_b.load(Ordering::Acquire);
            let snapshot = self.load_fields();
            let observed = observe(&snapshot);
            fence(Ordering::Acquire);
            let started = self.update_sequence_a.load(Ordering::Relaxed);
            if started == published {
                return (snapshot, observed);
            }
            core::hint::spin_loop();
        }
    }

    /// Open the writer bracket; the update is published when the guard drops
    ///
    /// Spins while another writer holds a guard. The caller must not be
    /// interruptible by a writer on the same CPU.
    pub fn begin_update(&self) -> ClockUpdate<'_> {
        loop {
            let published = self.update_sequence_b.load(Ordering::Acquire);
            let sequence = published.wrapping_add(1);
            if self
                .update_sequence_a
                .compare_exchange_weak(published, sequence, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                fence(Ordering::Release);
                return ClockUpdate {
                    state: self,
                    sequence,
                };
            }
            core::hint::spin_loop();
        }
    }

    /// Read-modify-write all fields inside one writer bracket
    pub fn update<R>(&self, mutate: impl FnOnce(&mut ClockSnapshot) -> R) -> R {
        let update = self.begin_update();
        let mut snapshot = update.current();
        let result = mutate(&mut snapshot);
        update.store(&snapshot);
        result
    }

    pub fn is_update_in_progress(&self) -> bool {
        self.update_sequence_a.load(Ordering::Acquire) != self.update_sequence_b.load(Ordering::Acquire)
    }

    fn load_fields(&self) -> ClockSnapshot {
        ClockSnapshot {
            seconds_since_boot: self.seconds_since_boot.load(Ordering::Relaxed),
            ticks_this_second: self.ticks_this_second.load(Ordering::Relaxed),
            epoch_time: Timespec::normalize(
                self.epoch_seconds.load(Ordering::Relaxed),
                self.epoch_nanoseconds.load(Ordering::Relaxed) as i64,
            ),
            remaining_epoch_adjustment: Timespec::normalize(
                self.adjustment_seconds.load(Ordering::Relaxed),
                self.adjustment_nanoseconds.load(Ordering::Relaxed) as i64,
            ),
            counter_at_last_update: self.counter_at_last_update.load(Ordering::Relaxed),
            ticks_per_second: self.ticks_per_second.load(Ordering::Relaxed),
        }
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer bracket over a [`ClockState`]
///
/// Field stores become visible to readers as a unit when the guard drops.
#[must_use = "the update is published when the guard is dropped"]
pub struct ClockUpdate<'a> {
    state: &'a ClockState,
    sequence: u32,
}

impl ClockUpdate<'_> {
    /// The fields as this writer sees them
    pub fn current(&self) -> ClockSnapshot {
        self.state.load_fields()
    }

    pub fn set_seconds_since_boot(&self, seconds: u64) {
        self.state.seconds_since_boot.store(seconds, Ordering::Relaxed);
    }

    pub fn set_ticks_this_second(&self, ticks: u32) {
        self.state.ticks_this_second.store(ticks, Ordering::Relaxed);
    }

    pub fn set_epoch_time(&self, epoch: Timespec) {
        self.state.epoch_seconds.store(epoch.seconds, Ordering::Relaxed);
        self.state.epoch_nanoseconds.store(epoch.nanoseconds, Ordering::Relaxed);
    }

    pub fn set_remaining_epoch_adjustment(&self, adjustment: Timespec) {
        self.state.adjustment_seconds.store(adjustment.seconds, Ordering::Relaxed);
        self.state
            .adjustment_nanoseconds
            .store(adjustment.nanoseconds, Ordering::Relaxed);
    }

    pub fn set_counter_at_last_update(&self, counter: u64) {
        self.state.counter_at_last_update.store(counter, Ordering::Relaxed);
    }

    pub fn set_ticks_per_second(&self, ticks_per_second: u64) {
        self.state.ticks_per_second.store(ticks_per_second, Ordering::Relaxed);
    }

    pub fn store(&self, snapshot: &ClockSnapshot) {
        self.set_seconds_since_boot(snapshot.seconds_since_boot);
        self.set_ticks_this_second(snapshot.ticks_this_second);
        self.set_epoch_time(snapshot.epoch_time);
        self.set_remaining_epoch_adjustment(snapshot.remaining_epoch_adjustment);
        self.set_counter_at_last_update(snapshot.counter_at_last_update);
        self.set_ticks_per_second(snapshot.ticks_per_second);
    }
}

impl Drop for ClockUpdate<'_> {
    fn drop(&mut self) {
        self.state
            .update_sequence_b
            .store(self.sequence, Ordering::Release);
    }
}
