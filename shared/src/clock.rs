// Clock identifiers accepted by clock_gettime-style queries

/// POSIX clock identifier (Linux numbering)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockId {
    /// Wall-clock time, slewed by adjtime
    Realtime = 0,
    /// Uptime since boot, never decreases
    Monotonic = 1,
    /// Uptime unaffected by any slewing
    MonotonicRaw = 4,
    /// Wall-clock time as of the last timer interrupt
    RealtimeCoarse = 5,
    /// Uptime as of the last timer interrupt
    MonotonicCoarse = 6,
}

impl ClockId {
    pub const ALL: [ClockId; 5] = [
        ClockId::Realtime,
        ClockId::Monotonic,
        ClockId::MonotonicRaw,
        ClockId::RealtimeCoarse,
        ClockId::MonotonicCoarse,
    ];

    pub const fn raw(self) -> i32 {
        self as i32
    }

    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ClockId::Realtime),
            1 => Some(ClockId::Monotonic),
            4 => Some(ClockId::MonotonicRaw),
            5 => Some(ClockId::RealtimeCoarse),
            6 => Some(ClockId::MonotonicCoarse),
            _ => None,
        }
    }
}

/// Raw clock identifier that names no supported clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownClockId(pub i32);

impl TryFrom<i32> for ClockId {
    type Error = UnknownClockId;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        ClockId::from_raw(raw).ok_or(UnknownClockId(raw))
    }
}

/// How fresh a time query must be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePrecision {
    /// Value latched by the most recent timer interrupt
    Coarse,
    /// Read the hardware counter live when the time-keeper supports it
    #[default]
    Precise,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        for id in ClockId::ALL {
            assert_eq!(ClockId::try_from(id.raw()), Ok(id));
        }
    }

    #[test]
    fn test_unknown_ids() {
        for raw in [-1, 2, 3, 7, i32::MAX] {
            assert_eq!(ClockId::try_from(raw), Err(UnknownClockId(raw)));
        }
    }
}
