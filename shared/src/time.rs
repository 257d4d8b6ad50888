// Timestamp types for moteOS
// Normalized second/sub-second pairs shared by the clock and its consumers

use core::ops::{Add, AddAssign, Sub, SubAssign};

/// Nanoseconds in one second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A point in time or a signed span, as whole seconds plus nanoseconds
///
/// Values produced by this module are always normalized: `nanoseconds` lies in
/// `[0, 1e9)` and the sign lives in `seconds`, so `-1.5s` is stored as
/// `{ seconds: -2, nanoseconds: 500_000_000 }`. Derived ordering is therefore
/// chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl Timespec {
    pub const ZERO: Self = Self {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Build a timestamp from an already-normalized pair
    ///
    /// # Panics
    ///
    /// Panics if `nanoseconds` is outside `[0, 1e9)`.
    pub const fn new(seconds: i64, nanoseconds: i32) -> Self {
        assert!(nanoseconds >= 0 && (nanoseconds as i64) < NANOS_PER_SECOND);
        Self {
            seconds,
            nanoseconds,
        }
    }

    pub const fn from_secs(seconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds: 0,
        }
    }

    /// Build a timestamp from an arbitrary (possibly negative or oversized)
    /// nanosecond field, carrying into `seconds`
    pub const fn normalize(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds: seconds + nanoseconds.div_euclid(NANOS_PER_SECOND),
            nanoseconds: nanoseconds.rem_euclid(NANOS_PER_SECOND) as i32,
        }
    }

    pub const fn from_nanos(nanos: i64) -> Self {
        Self::normalize(0, nanos)
    }

    /// Total nanoseconds, widened so any `seconds` value fits
    pub const fn total_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanoseconds as i128
    }

    /// Whole milliseconds, truncating towards negative infinity
    pub const fn as_millis(&self) -> i64 {
        self.seconds * 1000 + (self.nanoseconds / 1_000_000) as i64
    }

    pub const fn is_zero(&self) -> bool {
        self.seconds == 0 && self.nanoseconds == 0
    }

    pub const fn to_timeval(&self) -> Timeval {
        Timeval {
            seconds: self.seconds,
            microseconds: self.nanoseconds / 1000,
        }
    }
}

impl Add for Timespec {
    type Output = Timespec;

    fn add(self, other: Timespec) -> Self::Output {
        Timespec::normalize(
            self.seconds + other.seconds,
            self.nanoseconds as i64 + other.nanoseconds as i64,
        )
    }
}

impl AddAssign for Timespec {
    fn add_assign(&mut self, other: Timespec) {
        *self = *self + other;
    }
}

impl Sub for Timespec {
    type Output = Timespec;

    fn sub(self, other: Timespec) -> Self::Output {
        Timespec::normalize(
            self.seconds - other.seconds,
            self.nanoseconds as i64 - other.nanoseconds as i64,
        )
    }
}

impl SubAssign for Timespec {
    fn sub_assign(&mut self, other: Timespec) {
        *self = *self - other;
    }
}

/// Microsecond-resolution timestamp (`struct timeval` shape)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeval {
    pub seconds: i64,
    pub microseconds: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_carries_both_ways() {
        assert_eq!(Timespec::normalize(1, 1_500_000_000), Timespec::new(2, 500_000_000));
        assert_eq!(Timespec::normalize(0, -1), Timespec::new(-1, 999_999_999));
        assert_eq!(Timespec::from_nanos(-1_500_000_000), Timespec::new(-2, 500_000_000));
    }

    #[test]
    fn test_add_sub() {
        let a = Timespec::new(1, 900_000_000);
        let b = Timespec::new(0, 200_000_000);
        assert_eq!(a + b, Timespec::new(2, 100_000_000));
        assert_eq!(b - a, Timespec::new(-2, 300_000_000));
        assert_eq!((b - a).total_nanos(), -1_700_000_000);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let earlier = Timespec::from_nanos(-1);
        let later = Timespec::ZERO;
        assert!(earlier < later);
        assert!(Timespec::new(1, 0) > Timespec::new(0, 999_999_999));
    }

    #[test]
    fn test_conversions() {
        let ts = Timespec::new(3, 456_789_000);
        assert_eq!(ts.as_millis(), 3456);
        assert_eq!(
            ts.to_timeval(),
            Timeval {
                seconds: 3,
                microseconds: 456_789
            }
        );
    }

    #[test]
    #[should_panic]
    fn test_new_rejects_denormalized() {
        let _ = Timespec::new(0, 1_000_000_000);
    }
}
