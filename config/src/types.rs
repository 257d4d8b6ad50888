//! Time subsystem boot configuration
//!
//! Typed view over the `time=` and `hpet=` kernel command-line options.

use crate::cmdline::KernelCommandLine;
use crate::error::ConfigError;

/// Which family of hardware timers to probe at boot (`time=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSource {
    /// Probe the HPET first, fall back to PIT + RTC
    #[default]
    Modern,
    /// Skip straight to PIT + RTC
    Legacy,
}

/// How HPET comparators are scanned (`hpet=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HpetMode {
    /// Periodic-capable comparators are switched to periodic mode and at least
    /// one is required
    #[default]
    Periodic,
    /// Comparators are left in one-shot mode
    NonPeriodic,
}

/// Boot-time configuration consumed by the time subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeConfig {
    pub source: TimeSource,
    pub hpet_mode: HpetMode,
}

impl TimeConfig {
    pub const TIME_OPTION: &'static str = "time";
    pub const HPET_OPTION: &'static str = "hpet";

    /// Read `time=` and `hpet=`; absent options take their defaults
    pub fn from_command_line(cmdline: &KernelCommandLine<'_>) -> Result<Self, ConfigError> {
        let source = match cmdline.lookup(Self::TIME_OPTION) {
            None | Some("modern") => TimeSource::Modern,
            Some("legacy") => TimeSource::Legacy,
            Some(other) => return Err(ConfigError::invalid_value(Self::TIME_OPTION, other)),
        };

        let hpet_mode = match cmdline.lookup(Self::HPET_OPTION) {
            None | Some("periodic") => HpetMode::Periodic,
            Some("nonperiodic") => HpetMode::NonPeriodic,
            Some(other) => return Err(ConfigError::invalid_value(Self::HPET_OPTION, other)),
        };

        Ok(Self { source, hpet_mode })
    }

    /// Parse a raw command line in one step
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Self::from_command_line(&KernelCommandLine::parse(raw)?)
    }

    pub fn probes_modern_timers(&self) -> bool {
        self.source == TimeSource::Modern
    }

    pub fn periodic_hpet_allowed(&self) -> bool {
        self.hpet_mode == HpetMode::Periodic
    }
}
