//! Timestamp and time base handling.
//!
//! The container counts time in nanoseconds while playback hosts count in
//! 100-nanosecond reference ticks. [`TimeBase`] converts between the two.

use std::cmp::Ordering;

/// A time base: one unit equals `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    /// Numerator.
    pub num: i64,
    /// Denominator.
    pub den: i64,
}

impl TimeBase {
    /// Create a new time base from numerator and denominator.
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Nanosecond time base (1/1000000000).
    pub const NANOSECONDS: Self = Self::new(1, 1_000_000_000);

    /// Host reference clock, 100 ns per tick (1/10000000).
    pub const REFERENCE: Self = Self::new(1, 10_000_000);

    /// Convert a value from this time base to another, truncating toward zero.
    pub fn convert(&self, value: i64, target: TimeBase) -> i64 {
        if *self == target {
            return value;
        }
        let num = value as i128 * self.num as i128 * target.den as i128;
        let den = self.den as i128 * target.num as i128;
        if den == 0 {
            return 0;
        }
        (num / den).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::NANOSECONDS
    }
}

/// Convert container nanoseconds to host reference ticks.
pub fn nanos_to_reference(ns: i64) -> i64 {
    TimeBase::NANOSECONDS.convert(ns, TimeBase::REFERENCE)
}

/// Convert host reference ticks to container nanoseconds.
pub fn reference_to_nanos(ticks: i64) -> i64 {
    ticks.saturating_mul(100)
}

/// A timestamp with an associated time base.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    /// The raw timestamp value.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Timestamp {
    /// Create a new timestamp.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Timestamp in host reference ticks.
    pub fn from_reference(ticks: i64) -> Self {
        Self::new(ticks, TimeBase::REFERENCE)
    }

    /// Timestamp in nanoseconds.
    pub fn from_nanos(ns: i64) -> Self {
        Self::new(ns, TimeBase::NANOSECONDS)
    }

    /// Value in nanoseconds.
    pub fn as_nanos(&self) -> i64 {
        self.time_base.convert(self.value, TimeBase::NANOSECONDS)
    }

    /// Value in host reference ticks.
    pub fn as_reference(&self) -> i64 {
        self.time_base.convert(self.value, TimeBase::REFERENCE)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.time_base == other.time_base {
            return self.value.cmp(&other.value);
        }
        let lhs = self.value as i128 * self.time_base.num as i128 * other.time_base.den as i128;
        let rhs = other.value as i128 * other.time_base.num as i128 * self.time_base.den as i128;
        lhs.cmp(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_reference_conversion() {
        assert_eq!(nanos_to_reference(1_500_000_000), 15_000_000);
        assert_eq!(nanos_to_reference(199), 1);
        assert_eq!(reference_to_nanos(15_000_000), 1_500_000_000);
    }

    #[test]
    fn test_timestamp_comparison_across_bases() {
        let a = Timestamp::from_reference(10_000_000);
        let b = Timestamp::from_nanos(1_000_000_000);
        let c = Timestamp::from_nanos(1_000_000_100);
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(c.as_nanos(), 1_000_000_100);
        assert_eq!(c.as_reference(), 10_000_001);
    }
}
