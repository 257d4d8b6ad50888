//! Kernel initialization functions
//!
//! Boot sequencing for the time subsystem and the logger. Each step here runs
//! once, in order, on the CPU that owns it; repeated or out-of-order calls are
//! reported instead of silently re-running.

use core::sync::atomic::{AtomicBool, Ordering};

use config::TimeConfig;
use log::LevelFilter;
use spin::Once;

use crate::error::TimeError;
use crate::platform::Platform;
use crate::time::selection::TimerInventory;
use crate::time::TimeManagement;

/// Install the serial logger and set the maximum log level
///
/// Returns `false` if a logger was already installed; the level is updated
/// either way.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub fn init_logging(level: LevelFilter) -> bool {
    use crate::logger::SerialLogger;

    static LOGGER: SerialLogger = SerialLogger::new();

    let installed = log::set_logger(&LOGGER).is_ok();
    log::set_max_level(level);
    installed
}

/// Parse the time options from the kernel command line
///
/// # Panics
///
/// The kernel cannot choose a clock source from an invalid option, so any
/// parse error is fatal.
pub fn parse_time_config(cmdline: &str) -> TimeConfig {
    match TimeConfig::parse(cmdline) {
        Ok(config) => config,
        Err(err) => panic!("Time: invalid boot configuration: {}", err),
    }
}

/// Owner of the kernel's single [`TimeManagement`] instance
///
/// Lives in a `static`; [`TimeSubsystem::initialize_boot_cpu`] assembles the
/// instance and every other subsystem receives it by reference.
pub struct TimeSubsystem<P: Platform> {
    boot_started: AtomicBool,
    time: Once<TimeManagement<P>>,
}

impl<P: Platform> TimeSubsystem<P> {
    pub const fn new() -> Self {
        Self {
            boot_started: AtomicBool::new(false),
            time: Once::new(),
        }
    }

    /// Initialize time management on the boot CPU
    ///
    /// Selects the hardware timers, seeds the wall clock and moves the system
    /// timer role to the local APIC timer if one was found.
    ///
    /// # Arguments
    ///
    /// * `config` - Parsed `time=`/`hpet=` options
    /// * `inventory` - Timer hardware found during boot probing
    /// * `platform` - Scheduler, timer queue and interrupt control
    ///
    /// # Returns
    ///
    /// * `Ok(&TimeManagement)` - The initialized instance
    /// * `Err(TimeError::AlreadyInitialized)` - A previous call already ran
    ///
    /// # Panics
    ///
    /// Panics when `platform` reports a CPU other than 0.
    pub fn initialize_boot_cpu(
        &self,
        config: &TimeConfig,
        inventory: TimerInventory,
        platform: P,
    ) -> Result<&TimeManagement<P>, TimeError> {
        assert_eq!(
            platform.current_cpu(),
            0,
            "Time: boot CPU initialization must run on CPU 0"
        );
        if self.boot_started.swap(true, Ordering::AcqRel) {
            return Err(TimeError::AlreadyInitialized);
        }
        let time = self
            .time
            .call_once(|| TimeManagement::new(config, inventory, platform));
        time.initialize_boot_cpu();
        Ok(time)
    }

    /// Enable this CPU's local timer
    ///
    /// Fails with [`TimeError::NotInitialized`] before the boot CPU finished
    /// [`TimeSubsystem::initialize_boot_cpu`].
    pub fn initialize_secondary_cpu(&self, cpu: u32) -> Result<(), TimeError> {
        self.get()
            .ok_or(TimeError::NotInitialized)?
            .initialize_secondary_cpu(cpu);
        Ok(())
    }

    pub fn get(&self) -> Option<&TimeManagement<P>> {
        self.time.get()
    }
}

impl<P: Platform> Default for TimeSubsystem<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_config() {
        let config = parse_time_config("root=/dev/sda time=legacy");
        assert!(!config.probes_modern_timers());
    }

    #[test]
    #[should_panic(expected = "invalid boot configuration")]
    fn test_unknown_time_source_is_fatal() {
        parse_time_config("time=atomic");
    }
}
