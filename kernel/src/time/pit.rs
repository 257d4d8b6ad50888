// 8254 Programmable Interval Timer
// Channel 0 in rate-generator mode, reload value chosen from the requested rate

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use super::hardware_timer::{CallbackSlot, HardwareTimerType, TimerCapabilities};
use super::OPTIMAL_TICKS_PER_SECOND_RATE;

/// PIT input clock in Hz
pub const BASE_FREQUENCY: u64 = 1_193_182;

/// Largest 16-bit reload value
const MAX_RELOAD: u64 = 0xFFFF;

/// Legacy periodic interrupt timer
#[derive(Debug)]
pub struct Pit {
    reload: AtomicU32,
    frequency: AtomicU64,
    periodic: AtomicBool,
    enabled: AtomicBool,
    callback: CallbackSlot,
}

impl Pit {
    /// A PIT programmed for [`OPTIMAL_TICKS_PER_SECOND_RATE`]
    pub fn new() -> Self {
        let reload = reload_for(OPTIMAL_TICKS_PER_SECOND_RATE);
        Self {
            reload: AtomicU32::new(reload as u32),
            frequency: AtomicU64::new(rate_for(reload)),
            periodic: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            callback: CallbackSlot::new(),
        }
    }

    pub fn reload_value(&self) -> u16 {
        self.reload.load(Ordering::Acquire) as u16
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new()
    }
}

/// Reload value whose rate is closest to `frequency`
fn reload_for(frequency: u64) -> u64 {
    let frequency = frequency.max(1);
    ((BASE_FREQUENCY + frequency / 2) / frequency).clamp(1, MAX_RELOAD)
}

/// Rate produced by a reload value, rounded to the nearest hertz
fn rate_for(reload: u64) -> u64 {
    (BASE_FREQUENCY + reload / 2) / reload
}

impl TimerCapabilities for Pit {
    fn timer_type(&self) -> HardwareTimerType {
        HardwareTimerType::I8253
    }

    fn model(&self) -> &'static str {
        "i8253"
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
        self.frequency.load(Ordering::Acquire)
    }

    fn is_capable_of_frequency(&self, frequency: u64) -> bool {
        frequency >= BASE_FREQUENCY / MAX_RELOAD && frequency <= BASE_FREQUENCY
    }

    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64 {
        rate_for(reload_for(target))
    }

    fn try_to_set_frequency(&self, frequency: u64) -> bool {
        if !self.is_capable_of_frequency(frequency) {
            return false;
        }
        let reload = reload_for(frequency);
        self.reload.store(reload as u32, Ordering::Release);
        self.frequency.store(rate_for(reload), Ordering::Release);
        self.enabled.store(true, Ordering::Release);
        true
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn callback_slot(&self) -> &CallbackSlot {
        &self.callback
    }
}
