//! Time management
//!
//! Turns hardware timer interrupts into a monotonic uptime clock and a
//! slew-corrected wall clock, readable from any CPU without locking.
//!
//! One [`TimeManagement`] instance is assembled on the boot CPU (see
//! [`crate::init::TimeSubsystem`]) and shared by reference afterwards.

pub mod apic;
pub mod clock_state;
pub mod hardware_timer;
pub mod hpet;
pub mod pit;
pub mod rtc;
pub mod selection;

use core::sync::atomic::{AtomicUsize, Ordering};

use config::TimeConfig;
use shared::{ClockId, RegisterState, TimePrecision, Timespec, Timeval, NANOS_PER_SECOND};

use crate::error::TimeError;
use crate::platform::Platform;

use self::clock_state::ClockState;
use self::hardware_timer::{HardwareTimer, HardwareTimerType, TickHandler, TimerCapabilities, TimerId};
use self::hpet::Hpet;
use self::selection::{select_timers, TimerInventory, TimerList};

/// Interrupt rate requested from the system timer
pub const OPTIMAL_TICKS_PER_SECOND_RATE: u64 = 1000;

/// Every HPET comparator plus PIT, RTC and the local APIC timer
pub const MAX_HARDWARE_TIMERS: usize = hpet::MAX_COMPARATORS + 3;

/// The kernel's clocks and the timers that drive them
pub struct TimeManagement<P: Platform> {
    platform: P,
    clock: ClockState,
    hardware_timers: TimerList,
    hpet: Option<Hpet>,
    system_timer: AtomicUsize,
    time_keeper: TimerId,
    apic_timer: Option<TimerId>,
    can_query_precise_time: bool,
    boot_time: i64,
}

impl<P: Platform> TimeManagement<P> {
    /// Select timers and seed the wall clock from the RTC
    ///
    /// # Panics
    ///
    /// Panics when no usable timer source exists (see [`select_timers`]).
    pub fn new(config: &TimeConfig, inventory: TimerInventory, platform: P) -> Self {
        let boot_time = if inventory.rtc_present() {
            inventory.rtc_boot_time
        } else {
            log::warn!("ACPI: RTC CMOS Not present, wall clock starts at the epoch");
            0
        };

        let selection = select_timers(config, inventory);

        let clock = ClockState::new();
        clock.update(|state| {
            state.epoch_time += Timespec::from_secs(boot_time);
            state.ticks_per_second = selection.time_ticks_per_second;
            if let Some(hpet) = &selection.hpet {
                state.counter_at_last_update = hpet.read_main_counter();
            }
        });

        Self {
            platform,
            clock,
            hardware_timers: selection.timers,
            hpet: selection.hpet,
            system_timer: AtomicUsize::new(selection.system_timer.0),
            time_keeper: selection.time_keeper,
            apic_timer: selection.apic_timer,
            can_query_precise_time: selection.can_query_precise_time,
            boot_time,
        }
    }

    /// Boot CPU bring-up: hand the system timer role to the local APIC timer
    /// when there is one
    ///
    /// # Panics
    ///
    /// Panics on any CPU but CPU 0.
    pub fn initialize_boot_cpu(&self) {
        assert_eq!(
            self.platform.current_cpu(),
            0,
            "Time: boot CPU initialization must run on CPU 0"
        );
        let Some(apic) = self.apic_timer else {
            log::warn!(
                "Time: No APIC timer, keeping {} as system timer",
                self.system_timer().model()
            );
            return;
        };
        log::info!("Time: Using APIC timer as system timer");
        self.set_system_timer(apic);
        self.hardware_timers[apic.0].enable_local_timer(0);
    }

    /// Per-CPU bring-up for every CPU but the boot CPU
    ///
    /// # Panics
    ///
    /// Panics for CPU 0, which is brought up by
    /// [`TimeManagement::initialize_boot_cpu`].
    pub fn initialize_secondary_cpu(&self, cpu: u32) {
        assert_ne!(cpu, 0, "Time: CPU 0 is not a secondary CPU");
        if let Some(apic) = self.apic_timer {
            log::info!("Time: Enable APIC timer on CPU #{}", cpu);
            self.hardware_timers[apic.0].enable_local_timer(cpu);
        }
    }

    /// Move the system timer role, and its tick handler, to `timer`
    ///
    /// # Panics
    ///
    /// Panics off the boot CPU, inside an interrupt handler, or for an
    /// unregistered timer.
    pub fn set_system_timer(&self, timer: TimerId) {
        assert_eq!(
            self.platform.current_cpu(),
            0,
            "Time: system timer can only be swapped on the boot CPU"
        );
        assert_eq!(
            self.platform.irq_depth(),
            0,
            "Time: system timer cannot be swapped from interrupt context"
        );
        let Some(new_timer) = self.timer(timer) else {
            panic!("Time: unknown timer {:?}", timer);
        };
        if self.is_system_timer(timer) {
            return;
        }

        self.platform.without_interrupts(&mut || {
            let old_timer = self.system_timer();
            let handler = old_timer.set_callback(TickHandler::None);
            old_timer.disable();
            new_timer.set_callback(handler);
            self.system_timer.store(timer.0, Ordering::Release);
        });
    }

    pub fn is_system_timer(&self, timer: TimerId) -> bool {
        self.system_timer_id() == timer
    }

    pub fn system_timer_id(&self) -> TimerId {
        TimerId(self.system_timer.load(Ordering::Acquire))
    }

    pub fn system_timer(&self) -> &HardwareTimer {
        &self.hardware_timers[self.system_timer_id().0]
    }

    pub fn time_keeper_id(&self) -> TimerId {
        self.time_keeper
    }

    pub fn time_keeper(&self) -> &HardwareTimer {
        &self.hardware_timers[self.time_keeper.0]
    }

    pub fn apic_timer_id(&self) -> Option<TimerId> {
        self.apic_timer
    }

    pub fn timer(&self, timer: TimerId) -> Option<&HardwareTimer> {
        self.hardware_timers.get(timer.0)
    }

    pub fn hardware_timers(&self) -> &[HardwareTimer] {
        &self.hardware_timers
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Raw access to the clock, for code that needs the seqlock directly
    pub fn clock_state(&self) -> &ClockState {
        &self.clock
    }

    pub fn can_query_precise_time(&self) -> bool {
        self.can_query_precise_time
    }

    /// Interrupt entry for `timer`: run whatever handler it currently owns
    pub fn handle_interrupt(&self, timer: TimerId, regs: &RegisterState) {
        let Some(hardware_timer) = self.timer(timer) else {
            return;
        };
        match hardware_timer.callback() {
            TickHandler::None => {}
            TickHandler::KeepTime => self.increment_time_since_boot(),
            TickHandler::SystemTick => self.system_timer_tick(regs),
            TickHandler::PreciseTick => {
                // Only the boot CPU writes the clock
                if self.platform.current_cpu() == 0 {
                    self.increment_time_since_boot_hpet();
                }
                self.system_timer_tick(regs);
            }
        }
    }

    /// Legacy time-keeper tick: advance by one nominal tick, slewing the wall
    /// clock by at most 1% towards the pending adjustment
    pub fn increment_time_since_boot(&self) {
        let ticks_per_second = self.time_keeper().checked_ticks_per_second();
        let nominal_tick_ns = NANOS_PER_SECOND / ticks_per_second as i64;
        self.clock
            .update(|state| state.advance_nominal_tick(nominal_tick_ns, ticks_per_second));
    }

    /// HPET tick: resync seconds/ticks from the main counter and carry the
    /// elapsed time into the wall clock
    ///
    /// # Panics
    ///
    /// Panics unless the time keeper is an HPET comparator.
    pub fn increment_time_since_boot_hpet(&self) {
        assert_eq!(
            self.time_keeper().timer_type(),
            HardwareTimerType::HighPrecisionEventTimer,
            "Time: time keeper is not an HPET comparator"
        );
        let Some(hpet) = &self.hpet else {
            panic!("Time: HPET time keeper without a main counter");
        };

        self.clock.update(|state| {
            let advance = hpet.update_time(
                state.seconds_since_boot,
                state.ticks_this_second,
                state.counter_at_last_update,
            );
            state.seconds_since_boot = advance.seconds_since_boot;
            state.ticks_this_second = advance.ticks_this_second;
            state.counter_at_last_update = advance.counter;
            // TODO: slew remaining_epoch_adjustment on this path as well
            state.epoch_time += Timespec::from_nanos(advance.delta_ns as i64);
        });
    }

    /// Hand a system timer tick to the timer queue and the scheduler
    pub fn system_timer_tick(&self, regs: &RegisterState) {
        // Don't expire timers while handling nested IRQs
        if self.platform.irq_depth() <= 1 {
            self.platform.fire_timer_queue();
        }
        self.platform.scheduler_tick(regs);
    }

    /// Time since boot
    ///
    /// `Precise` reads the HPET main counter live when it is the time keeper;
    /// otherwise the value is as of the last time-keeper interrupt.
    pub fn monotonic_time(&self, precision: TimePrecision) -> Timespec {
        let query_counter = precision == TimePrecision::Precise && self.can_query_precise_time;

        let (state, (seconds, ticks)) = self.clock.read_with(|state| match &self.hpet {
            Some(hpet) if query_counter => {
                let advance = hpet.update_time(
                    state.seconds_since_boot,
                    state.ticks_this_second,
                    state.counter_at_last_update,
                );
                (advance.seconds_since_boot, advance.ticks_this_second)
            }
            _ => (state.seconds_since_boot, state.ticks_this_second),
        });

        // Rate the ticks were counted at, not the time keeper's current one
        let ticks_per_second = state.ticks_per_second;
        assert!(ticks_per_second > 0, "Time: zero ticks per second");
        assert!(
            (ticks as u64) < ticks_per_second,
            "Time: {} ticks exceed {} ticks per second",
            ticks,
            ticks_per_second
        );
        let nanoseconds = ticks as u64 * NANOS_PER_SECOND as u64 / ticks_per_second;
        assert!(nanoseconds < NANOS_PER_SECOND as u64);
        Timespec::new(seconds as i64, nanoseconds as i32)
    }

    /// Uptime without any slewing applied
    pub fn monotonic_time_raw(&self) -> Timespec {
        self.monotonic_time(TimePrecision::Precise)
    }

    /// Wall-clock time as of the last time-keeper update
    pub fn epoch_time(&self, _precision: TimePrecision) -> Timespec {
        self.clock.read().epoch_time
    }

    /// `clock_gettime` for a raw clock id
    pub fn current_time(&self, clock_id: i32) -> Result<Timespec, TimeError> {
        let clock = ClockId::try_from(clock_id)?;
        Ok(self.clock_time(clock))
    }

    pub fn clock_time(&self, clock: ClockId) -> Timespec {
        match clock {
            ClockId::Monotonic => self.monotonic_time(TimePrecision::Precise),
            ClockId::MonotonicCoarse => self.monotonic_time(TimePrecision::Coarse),
            ClockId::MonotonicRaw => self.monotonic_time_raw(),
            ClockId::Realtime => self.epoch_time(TimePrecision::Precise),
            ClockId::RealtimeCoarse => self.epoch_time(TimePrecision::Coarse),
        }
    }

    pub fn is_valid_clock_id(clock_id: i32) -> bool {
        ClockId::from_raw(clock_id).is_some()
    }

    pub fn uptime_ms(&self) -> u64 {
        let uptime = self.monotonic_time(TimePrecision::Precise);
        uptime.seconds as u64 * 1000 + uptime.nanoseconds as u64 / 1_000_000
    }

    /// `settimeofday`: replace the wall clock and drop any pending adjustment
    pub fn set_epoch_time(&self, epoch: Timespec) {
        self.platform.without_interrupts(&mut || {
            self.clock.update(|state| {
                state.epoch_time = epoch;
                state.remaining_epoch_adjustment = Timespec::ZERO;
            });
        });
    }

    /// `adjtime`: install a new correction, returning the part of the previous
    /// one that was not yet applied
    pub fn set_remaining_epoch_time_adjustment(&self, adjustment: Timespec) -> Timespec {
        let mut previous = Timespec::ZERO;
        self.platform.without_interrupts(&mut || {
            previous = self.clock.update(|state| {
                core::mem::replace(&mut state.remaining_epoch_adjustment, adjustment)
            });
        });
        previous
    }

    pub fn remaining_epoch_time_adjustment(&self) -> Timespec {
        self.clock.read().remaining_epoch_adjustment
    }

    /// Interrupt rate of the time keeper
    pub fn ticks_per_second(&self) -> u64 {
        self.time_keeper().ticks_per_second()
    }

    /// RTC reading at boot, in seconds since the epoch
    pub fn boot_time(&self) -> i64 {
        self.boot_time
    }

    pub fn now_as_timeval(&self) -> Timeval {
        self.epoch_time(TimePrecision::Precise).to_timeval()
    }
}

impl<P: Platform> core::fmt::Debug for TimeManagement<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimeManagement")
            .field("system_timer", &self.system_timer().model())
            .field("time_keeper", &self.time_keeper().model())
            .field("can_query_precise_time", &self.can_query_precise_time)
            .field("time_ticks_per_second", &self.clock.read().ticks_per_second)
            .field("boot_time", &self.boot_time)
            .finish()
    }
}
