//! Local APIC timer
//!
//! One instance per CPU, all sharing the same calibrated bus frequency and
//! programming. The boot CPU configures it once; every other CPU only enables
//! its own copy. Enablement is tracked as a bitmask of CPU numbers.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use super::hardware_timer::{CallbackSlot, HardwareTimerType, TimerCapabilities};
use super::OPTIMAL_TICKS_PER_SECOND_RATE;

/// Divide configuration register setting used for all CPUs
pub const DIVIDE_BY: u64 = 16;

/// Local APIC timer, calibrated against the system timer during probing
#[derive(Debug)]
pub struct ApicTimer {
    bus_frequency: u64,
    initial_count: AtomicU32,
    periodic: AtomicBool,
    enabled_cpus: AtomicU64,
    callback: CallbackSlot,
}

impl ApicTimer {
    /// `bus_frequency` is the calibrated timer input clock in Hz
    pub fn new(bus_frequency: u64) -> Self {
        let timer = Self {
            bus_frequency,
            initial_count: AtomicU32::new(0),
            periodic: AtomicBool::new(false),
            enabled_cpus: AtomicU64::new(0),
            callback: CallbackSlot::new(),
        };
        if let Some(count) = timer.initial_count_for(OPTIMAL_TICKS_PER_SECOND_RATE) {
            timer.initial_count.store(count, Ordering::Release);
        }
        timer
    }

    pub fn bus_frequency(&self) -> u64 {
        self.bus_frequency
    }

    fn counter_frequency(&self) -> u64 {
        self.bus_frequency / DIVIDE_BY
    }

    fn initial_count_for(&self, frequency: u64) -> Option<u32> {
        let counter_frequency = self.counter_frequency();
        if frequency == 0 || counter_frequency == 0 {
            return None;
        }
        let count = ((counter_frequency + frequency / 2) / frequency).clamp(1, u32::MAX as u64);
        Some(count as u32)
    }

    pub fn initial_count(&self) -> u32 {
        self.initial_count.load(Ordering::Acquire)
    }

    pub fn is_enabled_on(&self, cpu: u32) -> bool {
        cpu < 64 && self.enabled_cpus.load(Ordering::Acquire) & (1 << cpu) != 0
    }
}

impl TimerCapabilities for ApicTimer {
    fn timer_type(&self) -> HardwareTimerType {
        HardwareTimerType::LocalApicTimer
    }

    fn model(&self) -> &'static str {
        "LocalAPIC"
    }

    fn is_periodic_capable(&self) -> bool {
        true
    }

    fn is_periodic(&self) -> bool {
        self.periodic.load(Ordering::Acquire)
    }

    fn enter_periodic_mode(&self) {
        self.periodic.store(true, Ordering::Release);
    }

    fn ticks_per_second(&self) -> u64 {
        match self.initial_count() {
            0 => 0,
            count => self.counter_frequency() / count as u64,
        }
    }

    fn is_capable_of_frequency(&self, frequency: u64) -> bool {
        frequency > 0 && frequency <= self.counter_frequency()
    }

    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64 {
        let target = target.clamp(1, self.counter_frequency().max(1));
        match self.initial_count_for(target) {
            Some(count) => self.counter_frequency() / count as u64,
            None => 0,
        }
    }

    fn try_to_set_frequency(&self, frequency: u64) -> bool {
        if !self.is_capable_of_frequency(frequency) {
            return false;
        }
        match self.initial_count_for(frequency) {
            Some(count) => {
                self.initial_count.store(count, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn disable(&self) {
        self.enabled_cpus.store(0, Ordering::Release);
    }

    fn enable_local_timer(&self, cpu: u32) {
        if cpu < 64 {
            self.enabled_cpus.fetch_or(1 << cpu, Ordering::AcqRel);
        }
    }

    fn callback_slot(&self) -> &CallbackSlot {
        &self.callback
    }
}
