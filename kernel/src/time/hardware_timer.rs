//! Hardware timer capability interface
//!
//! Every timer device the kernel can drive implements [`TimerCapabilities`].
//! The set of devices is fixed, so the registered timers are stored as the
//! closed [`HardwareTimer`] enum and dispatched with a `match` rather than
//! through trait objects.
//!
//! Timer state is shared by every CPU once boot finishes, so all mutable
//! fields are atomics and every operation takes `&self`.

use core::sync::atomic::{AtomicU8, Ordering};

use super::apic::ApicTimer;
use super::hpet::HpetComparator;
use super::pit::Pit;
use super::rtc::RealTimeClock;

/// Precision class of a timer device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareTimerType {
    HighPrecisionEventTimer,
    LocalApicTimer,
    I8253,
    RealTimeClock,
}

/// Interrupt-time handler a timer invokes on every tick
///
/// The kernel only ever installs one of these entry points, so the callback
/// is a tag rather than a function pointer. It is stored in an atomic byte so
/// that ownership moves between timers without a window where two timers
/// run the same handler.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickHandler {
    /// Interrupts are ignored
    #[default]
    None = 0,
    /// Advance the second/tick counters by one nominal tick (legacy time-keeper)
    KeepTime = 1,
    /// Drive the timer queue and the scheduler (legacy system timer)
    SystemTick = 2,
    /// Resync from the HPET main counter on the boot CPU, then drive the
    /// timer queue and the scheduler
    PreciseTick = 3,
}

impl TickHandler {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TickHandler::KeepTime,
            2 => TickHandler::SystemTick,
            3 => TickHandler::PreciseTick,
            _ => TickHandler::None,
        }
    }
}

/// Atomic home of a timer's [`TickHandler`]
#[derive(Debug, Default)]
pub struct CallbackSlot(AtomicU8);

impl CallbackSlot {
    pub const fn new() -> Self {
        Self(AtomicU8::new(TickHandler::None as u8))
    }

    pub fn get(&self) -> TickHandler {
        TickHandler::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Install `handler`, returning whatever was installed before
    pub fn swap(&self, handler: TickHandler) -> TickHandler {
        TickHandler::from_u8(self.0.swap(handler as u8, Ordering::AcqRel))
    }
}

/// Contract every timer backend satisfies
pub trait TimerCapabilities {
    fn timer_type(&self) -> HardwareTimerType;

    /// Human-readable device name for boot logs
    fn model(&self) -> &'static str;

    fn is_periodic_capable(&self) -> bool;

    fn is_periodic(&self) -> bool;

    /// Backend half of [`TimerCapabilities::set_periodic`]
    fn enter_periodic_mode(&self);

    /// Switch to periodic interrupts
    ///
    /// # Panics
    ///
    /// Panics if the timer cannot run periodically.
    fn set_periodic(&self) {
        assert!(
            self.is_periodic_capable(),
            "Time: {} is not periodic capable",
            self.model()
        );
        self.enter_periodic_mode();
    }

    /// Currently configured interrupt rate
    fn ticks_per_second(&self) -> u64;

    fn is_capable_of_frequency(&self, frequency: u64) -> bool;

    /// Closest rate the divisor hardware can produce for `target`
    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64;

    /// Reprogram the rate; the achieved rate must be re-read with
    /// [`TimerCapabilities::ticks_per_second`] since divisors are discrete
    fn try_to_set_frequency(&self, frequency: u64) -> bool;

    fn disable(&self);

    /// Start the calling CPU's instance of a per-CPU timer
    fn enable_local_timer(&self, _cpu: u32) {}

    fn callback_slot(&self) -> &CallbackSlot;

    /// Install the interrupt-time handler, returning the previous one
    fn set_callback(&self, handler: TickHandler) -> TickHandler {
        self.callback_slot().swap(handler)
    }

    fn callback(&self) -> TickHandler {
        self.callback_slot().get()
    }
}

/// Index of a registered timer inside the time subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub usize);

/// A registered timer device
#[derive(Debug)]
pub enum HardwareTimer {
    Hpet(HpetComparator),
    LocalApic(ApicTimer),
    Pit(Pit),
    Rtc(RealTimeClock),
}

macro_rules! dispatch {
    ($self:expr, $timer:ident => $body:expr) => {
        match $self {
            HardwareTimer::Hpet($timer) => $body,
            HardwareTimer::LocalApic($timer) => $body,
            HardwareTimer::Pit($timer) => $body,
            HardwareTimer::Rtc($timer) => $body,
        }
    };
}

impl HardwareTimer {
    /// Configured interrupt rate
    ///
    /// # Panics
    ///
    /// Panics on a zero rate; callers divide by it.
    pub fn checked_ticks_per_second(&self) -> u64 {
        let ticks_per_second = self.ticks_per_second();
        assert!(
            ticks_per_second > 0,
            "Time: {} reports zero ticks per second",
            self.model()
        );
        ticks_per_second
    }

    pub fn as_local_apic(&self) -> Option<&ApicTimer> {
        match self {
            HardwareTimer::LocalApic(apic) => Some(apic),
            _ => None,
        }
    }
}

impl TimerCapabilities for HardwareTimer {
    fn timer_type(&self) -> HardwareTimerType {
        dispatch!(self, t => t.timer_type())
    }

    fn model(&self) -> &'static str {
        dispatch!(self, t => t.model())
    }

    fn is_periodic_capable(&self) -> bool {
        dispatch!(self, t => t.is_periodic_capable())
    }

    fn is_periodic(&self) -> bool {
        dispatch!(self, t => t.is_periodic())
    }

    fn enter_periodic_mode(&self) {
        dispatch!(self, t => t.enter_periodic_mode())
    }

    fn set_periodic(&self) {
        dispatch!(self, t => t.set_periodic())
    }

    fn ticks_per_second(&self) -> u64 {
        dispatch!(self, t => t.ticks_per_second())
    }

    fn is_capable_of_frequency(&self, frequency: u64) -> bool {
        dispatch!(self, t => t.is_capable_of_frequency(frequency))
    }

    fn calculate_nearest_possible_frequency(&self, target: u64) -> u64 {
        dispatch!(self, t => t.calculate_nearest_possible_frequency(target))
    }

    fn try_to_set_frequency(&self, frequency: u64) -> bool {
        dispatch!(self, t => t.try_to_set_frequency(frequency))
    }

    fn disable(&self) {
        dispatch!(self, t => t.disable())
    }

    fn enable_local_timer(&self, cpu: u32) {
        dispatch!(self, t => t.enable_local_timer(cpu))
    }

    fn callback_slot(&self) -> &CallbackSlot {
        dispatch!(self, t => t.callback_slot())
    }
}
