//! Date and date-time values used in `APPEND`'s internal date, `SEARCH`
//! date keys, and `FETCH`'s `INTERNALDATE`.

use chrono::{DateTime as ChronoDateTime, FixedOffset, NaiveDate as ChronoNaiveDate};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `date-time` — a full date, time, and zone offset, as used for
/// `INTERNALDATE`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime(pub ChronoDateTime<FixedOffset>);

impl From<ChronoDateTime<FixedOffset>> for DateTime {
    fn from(value: ChronoDateTime<FixedOffset>) -> Self {
        Self(value)
    }
}

/// `date` — a bare calendar date, as used in `SEARCH`'s `SINCE`/`BEFORE`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaiveDate(pub ChronoNaiveDate);

impl From<ChronoNaiveDate> for NaiveDate {
    fn from(value: ChronoNaiveDate) -> Self {
        Self(value)
    }
}
