//! Wall-clock helpers and validity windows.
//!
//! All claim timestamps are Unix seconds (`i64`).

use serde::{Deserialize, Serialize};

/// Current time in Unix seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

/// Where a point in time falls relative to a `nbf`/`exp` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Active,
    NotYetValid,
    Expired,
}

impl Validity {
    /// Classify `now` against an optional window.
    ///
    /// `nbf` is inclusive; a claim is expired once `now` passes `exp`.
    pub fn at(nbf: Option<i64>, exp: Option<i64>, now: i64) -> Self {
        if nbf.is_some_and(|nbf| now < nbf) {
            Validity::NotYetValid
        } else if exp.is_some_and(|exp| now > exp) {
            Validity::Expired
        } else {
            Validity::Active
        }
    }

    pub fn is_active(self) -> bool {
        self == Validity::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_is_active() {
        assert_eq!(Validity::at(None, None, 0), Validity::Active);
    }

    #[test]
    fn test_window_edges() {
        assert_eq!(Validity::at(Some(100), Some(200), 99), Validity::NotYetValid);
        assert_eq!(Validity::at(Some(100), Some(200), 100), Validity::Active);
        assert_eq!(Validity::at(Some(100), Some(200), 200), Validity::Active);
        assert_eq!(Validity::at(Some(100), Some(200), 201), Validity::Expired);
    }

    #[test]
    fn test_now_is_recent() {
        // 2020-01-01
        assert!(now_secs() > 1_577_836_800);
    }
}
