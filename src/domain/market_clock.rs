//! Exchange trading-hour windows.
//!
//! All windows are in exchange local time (IST, UTC+05:30) and half-open:
//! MCX trades `[09:00, 23:45)`, every other exchange `[09:15, 15:15)`.
//! Saturday and Sunday are closed everywhere.

use crate::domain::instrument::Exchange;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, Timelike, Utc, Weekday};
use serde::Serialize;

pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const MCX_OPEN_MIN: u32 = 9 * 60;
const MCX_CLOSE_MIN: u32 = 23 * 60 + 45;
const EQUITY_OPEN_MIN: u32 = 9 * 60 + 15;
const EQUITY_CLOSE_MIN: u32 = 15 * 60 + 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStatus {
    pub open: bool,
    pub message: String,
}

impl MarketStatus {
    fn open() -> Self {
        Self {
            open: true,
            message: "Open".to_string(),
        }
    }

    fn closed(message: &str) -> Self {
        Self {
            open: false,
            message: message.to_string(),
        }
    }
}

/// Whether `exchange` is trading at the UTC instant `now`.
pub fn is_open(exchange: &Exchange, now: DateTime<Utc>) -> MarketStatus {
    let local = exchange_local_time(now);
    session_status(exchange, local.weekday(), local.hour() * 60 + local.minute())
}

/// Same as [`is_open`] for a wall-clock time already in exchange local time.
pub fn is_open_local(exchange: &Exchange, local: NaiveDateTime) -> MarketStatus {
    session_status(exchange, local.weekday(), local.hour() * 60 + local.minute())
}

fn session_status(exchange: &Exchange, weekday: Weekday, minutes: u32) -> MarketStatus {
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return MarketStatus::closed("Weekend");
    }

    let (open, close, closed_message) = match exchange {
        Exchange::Mcx => (MCX_OPEN_MIN, MCX_CLOSE_MIN, "Closed (09:00–23:45)"),
        _ => (EQUITY_OPEN_MIN, EQUITY_CLOSE_MIN, "Closed (09:15–15:15)"),
    };

    if (open..close).contains(&minutes) {
        MarketStatus::open()
    } else {
        MarketStatus::closed(closed_message)
    }
}

/// The exchange's UTC+05:30 offset.
pub fn ist() -> FixedOffset {
    // IST_OFFSET_SECS is well inside the valid range; the fallback is unreachable.
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn exchange_local_time(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&ist())
}

/// Source of "now" for anything that gates on market hours.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
