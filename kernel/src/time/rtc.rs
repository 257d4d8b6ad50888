// CMOS real-time clock periodic interrupt
// Rate selector r in 3..=15 gives 32768 >> (r - 1) Hz

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::hardware_timer::{CallbackSlot, HardwareTimerType, TimerCapabilities};

/// RTC oscillator frequency in Hz
pub const BASE_FREQUENCY: u64 = 32_768;

const MIN_RATE: u8 = 3;
const MAX_RATE: u8 = 15;
/// 1024 Hz, the power-on default
const DEFAULT_RATE: u8 = 6;

/// RTC periodic interrupt source
#[derive(Debug)]
pub struct RealTimeClock {
    rate: AtomicU8,
    enabled: AtomicBool,
    callback: CallbackSlot,
}

impl RealTimeClock {
    pub fn new() -> Self {
        Self {
            rate: AtomicU8::new(DEFAULT_RATE),
            enabled: AtomicBool::new(true),
            callback: CallbackSlot::new(),
        }
    }

    /// Current rate selector (register A bits 0-3)
    pub fn rate(&self) -> u8 {
        self.rate.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for RealTimeClock {
    fn default() -> Self {
        Self::new()
    }
}

const fn frequency_of(rate: u8) -> u64 {
    BASE_FREQUENCY >> (rate - 1)
}

impl TimerCapabilities for RealTimeClock {
    fn timer_type(&self) -> HardwareTimerType {
        HardwareTimerType::RealTimeClock
    }

    fn model(&self) -> &'static str {
        "Real Time Clock"
    }

    fn is_periodic_capable(&self) -> bool {
        true
    }

    fn is_periodic(&self) -> bool {
        true
    }

    // The periodic interrupt is the only mode
    fn enter_periodic_mode(&self) {}

    fn ticks_per_second(&self) -> u64 {
        frequency_of(self.rate())
    }

    fn is_capable_of_frequency(&self, frequency: u64) -> bool {
        frequency.is_power_of_two()
            && frequency >= frequency_of(MAX_RATE)
            && frequency <= frequency_of(MIN_RATE)
    }

    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64 {
        (MIN_RATE..=MAX_RATE)
            .map(frequency_of)
            .min_by_key(|frequency| frequency.abs_diff(target))
            .unwrap_or(frequency_of(DEFAULT_RATE))
    }

    fn try_to_set_frequency(&self, frequency: u64) -> bool {
        if !self.is_capable_of_frequency(frequency) {
            return false;
        }
        let rate = (MIN_RATE..=MAX_RATE)
            .find(|&rate| frequency_of(rate) == frequency)
            .unwrap_or(DEFAULT_RATE);
        self.rate.store(rate, Ordering::Release);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate() {
        let rtc = RealTimeClock::new();
        assert_eq!(rtc.ticks_per_second(), 1024);
        assert!(rtc.is_periodic_capable());
    }

    #[test]
    fn test_powers_of_two_only() {
        let rtc = RealTimeClock::new();
        assert!(rtc.is_capable_of_frequency(2));
        assert!(rtc.is_capable_of_frequency(8192));
        assert!(!rtc.is_capable_of_frequency(1000));
        assert!(!rtc.is_capable_of_frequency(16384));
        assert!(!rtc.try_to_set_frequency(1000));
        assert_eq!(rtc.rate(), DEFAULT_RATE);
    }

    #[test]
    fn test_nearest_frequency() {
        let rtc = RealTimeClock::new();
        assert_eq!(rtc.calculate_nearest_possible_frequency(1000), 1024);
        assert_eq!(rtc.calculate_nearest_possible_frequency(300), 256);
        assert_eq!(rtc.calculate_nearest_possible_frequency(1_000_000), 8192);
        assert_eq!(rtc.calculate_nearest_possible_frequency(0), 2);

        let nearest = rtc.calculate_nearest_possible_frequency(100);
        assert!(rtc.try_to_set_frequency(nearest));
        assert_eq!(rtc.ticks_per_second(), 128);
        assert_eq!(rtc.rate(), 9);
    }
}
