use std::fmt;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::storage::LocalStore;

pub const FUNDED_USD_KEY: &str = "omd.fundedUSD";

/// Each funded dollar pushes the deadline back this many days.
pub const DAYS_PER_DOLLAR: f64 = 7.0;

/// Funding beyond this many days no longer moves the deadline.
pub const MAX_FUNDED_DAYS: i64 = 365 * 100_000;

/// Largest amount `set_funded_usd` accepts (`MAX_FUNDED_DAYS / 7`, rounded down).
pub const MAX_FUNDED_USD: f64 = 5_214_285.0;

/// Countdown shown in the header: time left until the next January 1st,
/// extended by locally recorded funding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundedCountdown {
    pub funded_usd: f64,
    pub deadline: DateTime<Utc>,
    pub remaining: Duration,
}

impl FundedCountdown {
    pub fn at(now: DateTime<Utc>, funded_usd: f64) -> Self {
        let funded_usd = sanitize(funded_usd);
        // Partial days are dropped
        let extra_days = ((funded_usd * DAYS_PER_DOLLAR).trunc() as i64).min(MAX_FUNDED_DAYS);
        let deadline = Duration::try_days(extra_days)
            .and_then(|extra| next_january_first(now).checked_add_signed(extra))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let remaining = (deadline - now).max(Duration::zero());
        Self {
            funded_usd,
            deadline,
            remaining,
        }
    }

    /// Countdown using the amount stored under [`FUNDED_USD_KEY`].
    pub fn from_store(store: &dyn LocalStore, now: DateTime<Utc>) -> Self {
        Self::at(now, funded_usd(store))
    }

    pub fn funded_days(&self) -> f64 {
        self.funded_usd * DAYS_PER_DOLLAR
    }

    pub fn destroyed(&self) -> bool {
        self.remaining <= Duration::zero()
    }

    pub fn days(&self) -> i64 {
        self.remaining.num_seconds() / 86_400
    }

    pub fn hours(&self) -> i64 {
        (self.remaining.num_seconds() % 86_400) / 3_600
    }

    pub fn minutes(&self) -> i64 {
        (self.remaining.num_seconds() % 3_600) / 60
    }

    pub fn seconds(&self) -> i64 {
        self.remaining.num_seconds() % 60
    }
}

impl fmt::Display for FundedCountdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.destroyed() {
            write!(f, "DESTROYED")
        } else {
            write!(
                f,
                "{}d {:02}:{:02}:{:02}",
                self.days(),
                self.hours(),
                self.minutes(),
                self.seconds()
            )
        }
    }
}

/// Midnight UTC on January 1st of the following year.
pub fn next_january_first(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn sanitize(usd: f64) -> f64 {
    if usd.is_finite() && usd >= 0.0 {
        usd
    } else {
        0.0
    }
}

/// Stored funding; missing, unparsable, negative or non-finite reads as 0.
pub fn funded_usd(store: &dyn LocalStore) -> f64 {
    let raw = match store.get(FUNDED_USD_KEY) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("could not read funded amount: {}", e);
            None
        }
    };
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .map(sanitize)
        .unwrap_or(0.0)
}

pub fn set_funded_usd(store: &dyn LocalStore, usd: f64) -> Result<()> {
    if !usd.is_finite() || usd < 0.0 {
        bail!("Funded amount must be a non-negative number");
    }
    if usd > MAX_FUNDED_USD {
        bail!("Funded amount must be at most {}", MAX_FUNDED_USD);
    }
    store.set(FUNDED_USD_KEY, &usd.to_string())
}
