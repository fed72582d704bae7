//! OHLCV bar type: field shape plus `ta::{Open,High,Low,Close,Volume}` trait impls so
//! the `ta` crate's indicator primitives work directly against it (§3's invariants).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EvoError, Result};

/// One time-bucketed OHLCV observation (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Validates a single bar against §3's invariants. Does not check monotonicity
    /// against neighbors; that is a series-level property, see [`validate_series`].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(EvoError::invalid_input(format!(
                    "bar at {} has non-finite {}",
                    self.timestamp, name
                )));
            }
        }
        if self.volume < 0.0 {
            return Err(EvoError::invalid_input(format!(
                "bar at {} has negative volume {}",
                self.timestamp, self.volume
            )));
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if !(self.low <= body_low && body_high <= self.high) {
            return Err(EvoError::invalid_input(format!(
                "bar at {} violates low <= min(open,close) <= max(open,close) <= high \
                 (o={}, h={}, l={}, c={})",
                self.timestamp, self.open, self.high, self.low, self.close
            )));
        }
        Ok(())
    }
}

/// Validates a full series: every bar individually valid, and timestamps strictly
/// monotonic (§3, §6 "The core refuses invalid bars").
pub fn validate_series(bars: &[Bar]) -> Result<()> {
    let mut prev: Option<DateTime<Utc>> = None;
    for bar in bars {
        bar.validate()?;
        if let Some(prev_ts) = prev {
            if bar.timestamp <= prev_ts {
                return Err(EvoError::invalid_input(format!(
                    "timestamps not strictly monotonic: {} follows {}",
                    bar.timestamp, prev_ts
                )));
            }
        }
        prev = Some(bar.timestamp);
    }
    Ok(())
}

impl ta::Open for Bar {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Bar {
    fn volume(&self) -> f64 {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(secs: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }

    #[test]
    fn valid_bar_passes() {
        let b = bar_at(0, 100.0, 105.0, 95.0, 102.0, 10.0);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn high_below_close_is_rejected() {
        let b = bar_at(0, 100.0, 101.0, 95.0, 110.0, 10.0);
        assert!(b.validate().is_err());
    }

    #[test]
    fn negative_volume_is_rejected() {
        let b = bar_at(0, 100.0, 105.0, 95.0, 102.0, -1.0);
        assert!(b.validate().is_err());
    }

    #[test]
    fn non_finite_field_is_rejected() {
        let b = bar_at(0, f64::NAN, 105.0, 95.0, 102.0, 10.0);
        assert!(b.validate().is_err());
    }

    #[test]
    fn non_monotonic_series_is_rejected() {
        let bars = vec![
            bar_at(10, 100.0, 105.0, 95.0, 102.0, 10.0),
            bar_at(10, 102.0, 106.0, 96.0, 103.0, 10.0),
        ];
        assert!(validate_series(&bars).is_err());
    }

    #[test]
    fn monotonic_series_passes() {
        let bars = vec![
            bar_at(10, 100.0, 105.0, 95.0, 102.0, 10.0),
            bar_at(20, 102.0, 106.0, 96.0, 103.0, 10.0),
        ];
        assert!(validate_series(&bars).is_ok());
    }
}
