//! Boot-time timer selection
//!
//! Decides which registered timer drives scheduling (the system timer) and
//! which one advances the clock (the time keeper). The HPET is preferred; the
//! PIT + RTC pair is the fallback. Failing both is fatal.

use config::TimeConfig;
use heapless::Vec;

use super::apic::ApicTimer;
use super::hardware_timer::{HardwareTimer, TickHandler, TimerCapabilities, TimerId};
use super::hpet::{Hpet, HpetDevice};
use super::pit::Pit;
use super::rtc::RealTimeClock;
use super::{MAX_HARDWARE_TIMERS, OPTIMAL_TICKS_PER_SECOND_RATE};

/// Registered timers, indexed by [`TimerId`]
pub type TimerList = Vec<HardwareTimer, MAX_HARDWARE_TIMERS>;

/// Flags the ACPI tables report about timer hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcpiInfo {
    /// Cleared when the FADT sets the "CMOS RTC not present" boot flag
    pub cmos_rtc_present: bool,
}

/// Everything boot probing found, handed to the time subsystem once
#[derive(Debug, Default)]
pub struct TimerInventory {
    /// `None` when ACPI is disabled or unusable
    pub acpi: Option<AcpiInfo>,
    pub hpet: Option<HpetDevice>,
    /// Calibrated local APIC timer, if the APIC supports one
    pub apic_timer: Option<ApicTimer>,
    /// Seconds since the Unix epoch read from the CMOS RTC at boot
    pub rtc_boot_time: i64,
}

impl TimerInventory {
    /// Without ACPI the CMOS RTC is assumed to be there
    pub fn rtc_present(&self) -> bool {
        self.acpi.map_or(true, |acpi| acpi.cmos_rtc_present)
    }
}

/// Outcome of [`select_timers`]
#[derive(Debug)]
pub struct TimerSelection {
    pub timers: TimerList,
    /// HPET main counter, kept only when the HPET was selected
    pub hpet: Option<Hpet>,
    pub system_timer: TimerId,
    pub time_keeper: TimerId,
    pub apic_timer: Option<TimerId>,
    /// Whether monotonic queries can read a hardware counter live
    pub can_query_precise_time: bool,
    /// Resolution of `ticks_this_second`
    pub time_ticks_per_second: u64,
}

struct Probe {
    hpet: Option<Hpet>,
    system_timer: TimerId,
    time_keeper: TimerId,
    can_query_precise_time: bool,
    time_ticks_per_second: u64,
}

/// Register every timer in `inventory` and pick the system timer and the time
/// keeper
///
/// # Panics
///
/// Panics when no timer source is usable, when the HPET exposes no
/// comparators, or when periodic HPET mode is requested and no comparator
/// supports it.
pub fn select_timers(config: &TimeConfig, inventory: TimerInventory) -> TimerSelection {
    let TimerInventory {
        acpi,
        hpet,
        apic_timer,
        ..
    } = inventory;
    let mut timers = TimerList::new();

    let probe = if config.probes_modern_timers() {
        probe_non_legacy_timers(config, acpi, hpet, &mut timers)
            .or_else(|| probe_legacy_timers(acpi, &mut timers))
    } else {
        log::debug!("Time: legacy timers forced by configuration");
        probe_legacy_timers(acpi, &mut timers)
    };

    let Some(probe) = probe else {
        panic!("Time: no usable timer source found");
    };

    // Registered last; it only takes over once the boot CPU is initialized
    let apic_timer = apic_timer.map(|apic| register(&mut timers, HardwareTimer::LocalApic(apic)));

    TimerSelection {
        timers,
        hpet: probe.hpet,
        system_timer: probe.system_timer,
        time_keeper: probe.time_keeper,
        apic_timer,
        can_query_precise_time: probe.can_query_precise_time,
        time_ticks_per_second: probe.time_ticks_per_second,
    }
}

fn register(timers: &mut TimerList, timer: HardwareTimer) -> TimerId {
    let id = TimerId(timers.len());
    if let Err(timer) = timers.push(timer) {
        panic!("Time: no room to register {}", timer.model());
    }
    id
}

fn probe_non_legacy_timers(
    config: &TimeConfig,
    acpi: Option<AcpiInfo>,
    hpet: Option<HpetDevice>,
    timers: &mut TimerList,
) -> Option<Probe> {
    // The HPET is only discoverable through ACPI
    acpi?;
    let HpetDevice { hpet, comparators } = hpet?;
    assert!(
        !comparators.is_empty(),
        "HPET: initialization aborted, no comparators"
    );
    assert!(hpet.frequency() > 0, "HPET: main counter frequency is zero");
    log::debug!("HPET: Setting appropriate functions to timers");

    let first = timers.len();
    for comparator in comparators {
        register(timers, HardwareTimer::Hpet(comparator));
    }
    let candidates = &timers[first..];

    let periodic_allowed = config.periodic_hpet_allowed();
    let first_periodic = scan_and_initialize_periodic_timers(candidates, periodic_allowed);
    let first_non_periodic = scan_for_non_periodic_timers(candidates);

    if periodic_allowed {
        assert!(
            first_periodic.is_some(),
            "HPET: periodic mode requested but no comparator is periodic capable"
        );
    }

    let offset = first_periodic.or(first_non_periodic).unwrap_or(0);
    let system_timer = TimerId(first + offset);
    let timer = &timers[system_timer.0];
    timer.set_callback(TickHandler::PreciseTick);

    // Interrupts only need to be frequent enough for scheduling; time comes
    // from the main counter
    let nearest = timer.calculate_nearest_possible_frequency(OPTIMAL_TICKS_PER_SECOND_RATE);
    if !timer.try_to_set_frequency(nearest) {
        log::warn!("HPET: could not program comparator for {} Hz", nearest);
    }
    log::info!(
        "Time: Using HPET comparator {} as system timer ({} Hz, main counter {} Hz)",
        offset,
        timer.ticks_per_second(),
        hpet.frequency()
    );

    Some(Probe {
        time_ticks_per_second: hpet.frequency(),
        hpet: Some(hpet),
        system_timer,
        time_keeper: system_timer,
        can_query_precise_time: true,
    })
}

/// Returns the position of the first periodic-capable timer, switching each
/// of them to periodic mode when `enable` is set
fn scan_and_initialize_periodic_timers(timers: &[HardwareTimer], enable: bool) -> Option<usize> {
    log::debug!("Time: Scanning for periodic timers");
    let mut first = None;
    for (index, timer) in timers.iter().enumerate() {
        if timer.is_periodic_capable() {
            first.get_or_insert(index);
            if enable {
                timer.set_periodic();
            }
        }
    }
    first
}

fn scan_for_non_periodic_timers(timers: &[HardwareTimer]) -> Option<usize> {
    log::debug!("Time: Scanning for non-periodic timers");
    timers.iter().position(|timer| !timer.is_periodic_capable())
}

fn probe_legacy_timers(acpi: Option<AcpiInfo>, timers: &mut TimerList) -> Option<Probe> {
    if let Some(acpi) = acpi {
        if !acpi.cmos_rtc_present {
            log::debug!("ACPI: CMOS RTC Not Present");
            return None;
        }
        log::debug!("ACPI: CMOS RTC Present");
    }

    let time_keeper = register(timers, HardwareTimer::Pit(Pit::new()));
    let system_timer = register(timers, HardwareTimer::Rtc(RealTimeClock::new()));
    timers[time_keeper.0].set_callback(TickHandler::KeepTime);
    timers[system_timer.0].set_callback(TickHandler::SystemTick);

    // The clock is only as accurate as the interrupts
    let time_ticks_per_second = timers[time_keeper.0].checked_ticks_per_second();
    log::info!(
        "Time: Using {} as time keeper ({} Hz) and {} as system timer",
        timers[time_keeper.0].model(),
        time_ticks_per_second,
        timers[system_timer.0].model()
    );

    Some(Probe {
        hpet: None,
        system_timer,
        time_keeper,
        can_query_precise_time: false,
        time_ticks_per_second,
    })
}
