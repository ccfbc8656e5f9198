//! Message sequence numbers and UIDs, and the sets built out of them.
//!
//! A [`NumSet`] is an ordered sequence of [`NumRange`]s, each
//! `{start, stop}` with `stop >= start >= 1`, plus the `*` sentinel meaning
//! "the highest value currently applicable" (resolved against the
//! mailbox's message count or `UIDNEXT - 1` by the caller, not by this
//! type). [`SeqSet`] and [`UidSet`] are newtypes over the same
//! implementation so message sequence numbers and UIDs are never
//! accidentally mixed at a call site; equality is defined on the
//! normalized canonical form (sorted, merged, no overlaps), and
//! serialization always produces that canonical form: `a:b,c,d:*`.

use std::cmp::max;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single endpoint of a range: either a concrete 1-based number, or `*`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqNo {
    Value(u32),
    /// `*` — the highest sequence number/UID applicable at evaluation time.
    Largest,
}

impl SeqNo {
    /// Resolve `*` against the caller-supplied highest value. `0` is
    /// returned for `*` in an empty mailbox, matching nothing — per the
    /// spec's edge-case note that `*` in an empty mailbox resolves to `0`.
    pub fn resolve(self, highest: u32) -> u32 {
        match self {
            Self::Value(v) => v,
            Self::Largest => highest,
        }
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Largest => write!(f, "*"),
        }
    }
}

/// A closed range `start:stop` (or a single number, when `start == stop`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumRange {
    pub start: SeqNo,
    pub stop: SeqNo,
}

impl NumRange {
    pub fn single(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::Zero);
        }
        Ok(Self {
            start: SeqNo::Value(value),
            stop: SeqNo::Value(value),
        })
    }

    pub fn range(start: u32, stop: u32) -> Result<Self, ValidationError> {
        if start == 0 || stop == 0 {
            return Err(ValidationError::Zero);
        }
        let (start, stop) = (start.min(stop), start.max(stop));
        Ok(Self {
            start: SeqNo::Value(start),
            stop: SeqNo::Value(stop),
        })
    }

    pub fn from_largest() -> Self {
        Self {
            start: SeqNo::Largest,
            stop: SeqNo::Largest,
        }
    }

    pub fn resolve(self, highest: u32) -> (u32, u32) {
        let a = self.start.resolve(highest);
        let b = self.stop.resolve(highest);
        (a.min(b), a.max(b))
    }

    fn sort_key(self, highest: u32) -> (u32, u32) {
        self.resolve(highest)
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.stop {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.stop)
        }
    }
}

/// A sequence of [`NumRange`]s. Not used directly — see [`SeqSet`] and
/// [`UidSet`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NumSet(Vec<NumRange>);

impl NumSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[NumRange] {
        &self.0
    }

    pub fn from_ranges(ranges: Vec<NumRange>) -> Self {
        Self(ranges).normalized()
    }

    pub fn single(value: u32) -> Result<Self, ValidationError> {
        Ok(Self(vec![NumRange::single(value)?]))
    }

    /// Normalize into canonical form: sort by resolved start (treating `*`
    /// as larger than any concrete value, matching RFC ordering), then
    /// merge overlapping/adjacent ranges. `*` ranges are kept distinct
    /// since they are resolved lazily against a mailbox size that isn't
    /// known here.
    pub fn normalized(self) -> Self {
        let mut ranges = self.0;
        ranges.sort_by_key(|r| r.sort_key(u32::MAX));

        let mut merged: Vec<NumRange> = Vec::with_capacity(ranges.len());
        for r in ranges {
            if let Some(last) = merged.last_mut() {
                let (last_lo, last_hi) = last.sort_key(u32::MAX);
                let (lo, hi) = r.sort_key(u32::MAX);
                if lo <= last_hi.saturating_add(1) {
                    let new_hi = max(last_hi, hi);
                    *last = NumRange::range(last_lo, new_hi).expect("both endpoints nonzero");
                    continue;
                }
            }
            merged.push(r);
        }
        Self(merged)
    }

    /// Every concrete value (`*` resolved against `highest`) the set
    /// matches, in ascending order, without duplicates.
    /// `0` can only arise from resolving `*` against an empty mailbox
    /// (`highest == 0`); it is never a valid sequence number or UID, so it
    /// is filtered out rather than yielded as a match.
    pub fn iter_resolved(&self, highest: u32) -> impl Iterator<Item = u32> + '_ {
        self.0
            .iter()
            .flat_map(move |r| {
                let (lo, hi) = r.resolve(highest);
                lo..=hi
            })
            .filter(|&v| v != 0)
    }

    pub fn contains_resolved(&self, value: u32, highest: u32) -> bool {
        if value == 0 {
            return false;
        }
        self.0
            .iter()
            .any(|r| matches!(r.resolve(highest), (lo, hi) if value >= lo && value <= hi))
    }

    pub fn to_canonical_string(&self) -> String {
        self.0
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }
        let mut ranges = Vec::new();
        for part in input.split(',') {
            ranges.push(parse_range(part)?);
        }
        Ok(Self(ranges).normalized())
    }
}

fn parse_endpoint(s: &str) -> Result<SeqNo, ValidationError> {
    if s == "*" {
        return Ok(SeqNo::Largest);
    }
    let v: u32 = s
        .parse()
        .map_err(|_| ValidationError::Other(format!("not a number: {s}")))?;
    if v == 0 {
        return Err(ValidationError::Zero);
    }
    Ok(SeqNo::Value(v))
}

fn parse_range(s: &str) -> Result<NumRange, ValidationError> {
    match s.split_once(':') {
        Some((a, b)) => {
            let start = parse_endpoint(a)?;
            let stop = parse_endpoint(b)?;
            Ok(NumRange { start, stop })
        }
        None => Ok(NumRange {
            start: parse_endpoint(s)?,
            stop: parse_endpoint(s)?,
        }),
    }
}

macro_rules! num_set_flavor {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub NumSet);

        impl $name {
            pub fn empty() -> Self {
                Self(NumSet::empty())
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn single(value: u32) -> Result<Self, ValidationError> {
                Ok(Self(NumSet::single(value)?))
            }

            pub fn parse(input: &str) -> Result<Self, ValidationError> {
                Ok(Self(NumSet::parse(input)?))
            }

            pub fn iter_resolved(&self, highest: u32) -> impl Iterator<Item = u32> + '_ {
                self.0.iter_resolved(highest)
            }

            pub fn contains_resolved(&self, value: u32, highest: u32) -> bool {
                self.0.contains_resolved(value, highest)
            }

            pub fn to_canonical_string(&self) -> String {
                self.0.to_canonical_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_canonical_string())
            }
        }

        impl From<NumSet> for $name {
            fn from(value: NumSet) -> Self {
                Self(value)
            }
        }
    };
}

num_set_flavor!(SeqSet, "A set of message sequence numbers.");
num_set_flavor!(UidSet, "A set of UIDs.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let set = SeqSet::parse("1:5,3,7,9:11").unwrap();
        let reparsed = SeqSet::parse(&set.to_canonical_string()).unwrap();
        assert_eq!(set, reparsed);
    }

    #[test]
    fn overlapping_ranges_merge() {
        let set = SeqSet::parse("1:5,3:8,10").unwrap();
        assert_eq!(set.to_canonical_string(), "1:8,10");
    }

    #[test]
    fn adjacent_ranges_merge() {
        let set = SeqSet::parse("1:3,4:6").unwrap();
        assert_eq!(set.to_canonical_string(), "1:6");
    }

    #[test]
    fn star_resolves_to_highest_and_zero_when_empty() {
        let set = SeqSet::parse("*").unwrap();
        assert_eq!(set.iter_resolved(0).collect::<Vec<_>>(), Vec::<u32>::new());
        assert_eq!(set.iter_resolved(10).collect::<Vec<_>>(), vec![10]);
    }

    #[test]
    fn zero_is_never_valid() {
        assert!(SeqSet::parse("0").is_err());
        assert!(UidSet::single(0).is_err());
    }

    #[test]
    fn seq_and_uid_sets_are_distinct_types() {
        // This is a compile-time property: `SeqSet` and `UidSet` cannot be
        // used interchangeably, which is the whole point of the newtypes.
        let seq = SeqSet::parse("1:5").unwrap();
        let uid = UidSet::parse("1:5").unwrap();
        assert_eq!(seq.to_canonical_string(), uid.to_canonical_string());
    }
}
