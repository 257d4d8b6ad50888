//! High Precision Event Timer
//!
//! The HPET contributes two things: a free-running main counter that the
//! clock reads live for sub-tick resolution, and a set of comparators that
//! raise interrupts and are registered as individual timers.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use heapless::Vec;
use shared::NANOS_PER_SECOND;

use super::hardware_timer::{CallbackSlot, HardwareTimerType, TimerCapabilities};
use super::OPTIMAL_TICKS_PER_SECOND_RATE;

/// Comparator count the HPET capabilities register can advertise
pub const MAX_COMPARATORS: usize = 32;

/// Femtoseconds per second, the unit of the HPET counter clock period
const FEMTOS_PER_SECOND: u64 = 1_000_000_000_000_000;

/// Offset of the main counter value register
const MAIN_COUNTER_OFFSET: usize = 0xF0;

/// Source of the HPET main counter value
pub trait MainCounter: Sync {
    fn read(&self) -> u64;
}

/// Main counter read straight from the HPET register block
#[derive(Debug)]
pub struct MmioMainCounter {
    base: usize,
}

impl MmioMainCounter {
    /// # Safety
    ///
    /// `base` must be the virtual address of a mapped HPET register block that
    /// stays mapped for the kernel's lifetime.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl MainCounter for MmioMainCounter {
    fn read(&self) -> u64 {
        // SAFETY: the constructor's contract guarantees the mapping
        unsafe { core::ptr::read_volatile((self.base + MAIN_COUNTER_OFFSET) as *const u64) }
    }
}

/// Result of folding the counter delta since the last update into a
/// seconds/ticks pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdvance {
    /// Main counter value the delta was measured against
    pub counter: u64,
    pub seconds_since_boot: u64,
    pub ticks_this_second: u32,
    /// Time elapsed since the previous update, in nanoseconds
    pub delta_ns: u64,
}

/// The HPET main counter
pub struct Hpet {
    counter: &'static dyn MainCounter,
    frequency: u64,
    counter_mask: u64,
}

impl Hpet {
    /// `period_fs` is the counter clock period from the capabilities register
    pub fn new(counter: &'static dyn MainCounter, period_fs: u32, counter_is_64bit: bool) -> Self {
        let frequency = if period_fs == 0 {
            0
        } else {
            FEMTOS_PER_SECOND / period_fs as u64
        };
        Self::with_frequency(counter, frequency, counter_is_64bit)
    }

    pub fn with_frequency(counter: &'static dyn MainCounter, frequency: u64, counter_is_64bit: bool) -> Self {
        Self {
            counter,
            frequency,
            counter_mask: if counter_is_64bit {
                u64::MAX
            } else {
                u32::MAX as u64
            },
        }
    }

    /// Main counter frequency in Hz
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn read_main_counter(&self) -> u64 {
        self.counter.read() & self.counter_mask
    }

    /// Counter ticks between two reads, accounting for one wrap of a 32-bit
    /// counter
    pub fn ticks_between(&self, earlier: u64, later: u64) -> u64 {
        later.wrapping_sub(earlier) & self.counter_mask
    }

    /// Read the main counter and fold the ticks elapsed since `last_counter`
    /// into the given seconds/ticks pair
    ///
    /// This is a pure query; the caller decides whether to publish the result.
    pub fn update_time(&self, seconds_since_boot: u64, ticks_this_second: u32, last_counter: u64) -> CounterAdvance {
        let counter = self.read_main_counter();
        let delta_ticks = self.ticks_between(last_counter, counter);
        let ticks_per_second = self.frequency;
        assert!(ticks_per_second > 0, "HPET: main counter frequency is zero");

        let total_ticks = ticks_this_second as u64 + delta_ticks;
        let new_seconds = seconds_since_boot + total_ticks / ticks_per_second;
        let new_ticks = total_ticks % ticks_per_second;

        // Difference of two uptimes so rounding never accumulates
        let delta_ns = self.uptime_ns(new_seconds, new_ticks)
            - self.uptime_ns(seconds_since_boot, ticks_this_second as u64);

        CounterAdvance {
            counter,
            seconds_since_boot: new_seconds,
            ticks_this_second: new_ticks as u32,
            delta_ns: delta_ns as u64,
        }
    }

    fn uptime_ns(&self, seconds: u64, ticks: u64) -> u128 {
        seconds as u128 * NANOS_PER_SECOND as u128 + ticks as u128 * NANOS_PER_SECOND as u128 / self.frequency as u128
    }
}

impl core::fmt::Debug for Hpet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hpet")
            .field("frequency", &self.frequency)
            .field("counter_mask", &format_args!("{:#x}", self.counter_mask))
            .finish()
    }
}

/// An HPET found during boot probing: the main counter plus its comparators
#[derive(Debug)]
pub struct HpetDevice {
    pub hpet: Hpet,
    pub comparators: Vec<HpetComparator, MAX_COMPARATORS>,
}

impl HpetDevice {
    pub fn new(hpet: Hpet) -> Self {
        Self {
            hpet,
            comparators: Vec::new(),
        }
    }

    /// Add a comparator with the given capability bit; extra comparators past
    /// the architectural maximum are ignored
    pub fn with_comparator(mut self, periodic_capable: bool) -> Self {
        let index = self.comparators.len() as u8;
        let comparator = HpetComparator::new(index, periodic_capable, self.hpet.frequency());
        if self.comparators.push(comparator).is_err() {
            log::warn!(
                "HPET: ignoring comparator {} beyond the {} supported",
                index,
                MAX_COMPARATORS
            );
        }
        self
    }
}

/// One HPET comparator, usable as an interrupt source
#[derive(Debug)]
pub struct HpetComparator {
    index: u8,
    periodic_capable: bool,
    main_counter_frequency: u64,
    periodic: AtomicBool,
    enabled: AtomicBool,
    frequency: AtomicU64,
    callback: CallbackSlot,
}

impl HpetComparator {
    pub fn new(index: u8, periodic_capable: bool, main_counter_frequency: u64) -> Self {
        Self {
            index,
            periodic_capable,
            main_counter_frequency,
            periodic: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            frequency: AtomicU64::new(OPTIMAL_TICKS_PER_SECOND_RATE.min(main_counter_frequency)),
            callback: CallbackSlot::new(),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl TimerCapabilities for HpetComparator {
    fn timer_type(&self) -> HardwareTimerType {
        HardwareTimerType::HighPrecisionEventTimer
    }

    fn model(&self) -> &'static str {
        "HPET comparator"
    }

    fn is_periodic_capable(&self) -> bool {
        self.periodic_capable
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
        frequency > 0 && frequency <= self.main_counter_frequency
    }

    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64 {
        target.clamp(1, self.main_counter_frequency.max(1))
    }

    fn try_to_set_frequency(&self, frequency: u64) -> bool {
        if !self.is_capable_of_frequency(frequency) {
            return false;
        }
        self.frequency.store(frequency, Ordering::Release);
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

    struct FixedCounter(AtomicU64);

    impl MainCounter for FixedCounter {
        fn read(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn counter(value: u64) -> &'static FixedCounter {
        Box::leak(Box::new(FixedCounter(AtomicU64::new(value))))
    }

    #[test]
    fn test_frequency_from_period() {
        // 69.841279 ns period, the classic 14.318 MHz HPET
        let hpet = Hpet::new(counter(0), 69_841_279, true);
        assert_eq!(hpet.frequency(), 14_318_179);
    }

    #[test]
    fn test_update_time_carries_into_seconds() {
        let hpet = Hpet::with_frequency(counter(2_500), 1_000, true);
        let advance = hpet.update_time(7, 900, 1_000);
        assert_eq!(advance.counter, 2_500);
        assert_eq!(advance.seconds_since_boot, 9);
        assert_eq!(advance.ticks_this_second, 400);
        assert_eq!(advance.delta_ns, 1_500_000_000);
    }

    #[test]
    fn test_32bit_counter_wrap() {
        let hpet = Hpet::with_frequency(counter(10), 1_000_000, false);
        let last = u32::MAX as u64 - 9;
        assert_eq!(hpet.ticks_between(last, 10), 20);
        let advance = hpet.update_time(0, 0, last);
        assert_eq!(advance.ticks_this_second, 20);
        assert_eq!(advance.delta_ns, 20_000);
    }

    #[test]
    fn test_wall_clock_delta_does_not_drift_from_uptime() {
        let main_counter = counter(0);
        let hpet = Hpet::with_frequency(main_counter, 14_318_180, true);
        let (mut seconds, mut ticks, mut last) = (0, 0, 0);
        let mut elapsed_ns: u128 = 0;
        for step in 1..=10_000u64 {
            main_counter.0.store(step * 14_318, Ordering::SeqCst);
            let advance = hpet.update_time(seconds, ticks, last);
            elapsed_ns += advance.delta_ns as u128;
            seconds = advance.seconds_since_boot;
            ticks = advance.ticks_this_second;
            last = advance.counter;
        }
        assert_eq!(elapsed_ns, hpet.uptime_ns(seconds, ticks as u64));
        assert_eq!(seconds, 9);
    }

    #[test]
    fn test_comparator_frequency_negotiation() {
        let comparator = HpetComparator::new(0, true, 10_000_000);
        assert_eq!(comparator.ticks_per_second(), OPTIMAL_TICKS_PER_SECOND_RATE);
        assert_eq!(comparator.calculate_nearest_possible_frequency(0), 1);
        assert_eq!(comparator.calculate_nearest_possible_frequency(u64::MAX), 10_000_000);
        assert!(comparator.try_to_set_frequency(250));
        assert_eq!(comparator.ticks_per_second(), 250);
        assert!(!comparator.try_to_set_frequency(20_000_000));
        assert_eq!(comparator.ticks_per_second(), 250);
    }

    #[test]
    fn test_mmio_counter_reads_main_counter_register() {
        let registers: &'static mut [u64; 32] = Box::leak(Box::new([0; 32]));
        registers[MAIN_COUNTER_OFFSET / 8] = 0xDEAD_BEEF_0000_0001;
        let counter = unsafe { MmioMainCounter::new(registers.as_ptr() as usize) };
        let hpet = Hpet::with_frequency(Box::leak(Box::new(counter)), 1_000_000, false);
        assert_eq!(hpet.read_main_counter(), 1);
    }

    #[test]
    fn test_device_builder() {
        let device = HpetDevice::new(Hpet::with_frequency(counter(0), 10_000_000, true))
            .with_comparator(true)
            .with_comparator(false);
        assert_eq!(device.comparators.len(), 2);
        assert!(device.comparators[0].is_periodic_capable());
        assert!(!device.comparators[1].is_periodic_capable());
        assert_eq!(device.comparators[1].index(), 1);
    }

    #[test]
    fn test_device_caps_comparator_count() {
        let mut device = HpetDevice::new(Hpet::with_frequency(counter(0), 10_000_000, true));
        for _ in 0..=MAX_COMPARATORS {
            device = device.with_comparator(true);
        }
        assert_eq!(device.comparators.len(), MAX_COMPARATORS);
        assert_eq!(device.comparators[MAX_COMPARATORS - 1].index() as usize, MAX_COMPARATORS - 1);
    }
}
