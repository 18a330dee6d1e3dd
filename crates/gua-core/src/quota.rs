use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

/// One user's allowance for a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    pub remaining: u32,
    pub last_reset: NaiveDate,
}

/// Outcome of [`QuotaStore::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// One use was consumed; `remaining` is the balance after the decrement
    Allowed { remaining: u32 },
    Denied,
}

/// Per-user daily quota, held in memory for the lifetime of the process.
#[derive(Debug)]
pub struct QuotaStore {
    daily_limit: u32,
    records: Mutex<HashMap<String, QuotaRecord>>,
}

impl QuotaStore {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Reset the user's record if it is missing or dated before `today`,
    /// then consume one use if any is left.
    ///
    /// The read-modify-write happens under one lock, so concurrent calls for
    /// the same user can never exceed the daily limit.
    pub fn check_and_consume(&self, user_id: &str, today: NaiveDate) -> Verdict {
        let mut records = self.lock();
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| self.fresh(today));
        if record.last_reset != today {
            *record = self.fresh(today);
        }

        if record.remaining == 0 {
            return Verdict::Denied;
        }
        record.remaining -= 1;
        Verdict::Allowed {
            remaining: record.remaining,
        }
    }

    /// Uses left today without consuming one.
    pub fn remaining(&self, user_id: &str, today: NaiveDate) -> u32 {
        match self.lock().get(user_id) {
            Some(record) if record.last_reset == today => record.remaining,
            _ => self.daily_limit,
        }
    }

    /// 1-based index of the draw that left `remaining` uses.
    pub fn draw_number(&self, remaining: u32) -> u32 {
        self.daily_limit.saturating_sub(remaining)
    }

    pub fn record(&self, user_id: &str) -> Option<QuotaRecord> {
        self.lock().get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn fresh(&self, today: NaiveDate) -> QuotaRecord {
        QuotaRecord {
            remaining: self.daily_limit,
            last_reset: today,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, QuotaRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whether draws are limited per day.
#[derive(Debug)]
pub enum QuotaPolicy {
    Unlimited,
    Daily(QuotaStore),
}

impl QuotaPolicy {
    pub fn from_limit(limit: Option<u32>) -> Self {
        match limit {
            Some(limit) => QuotaPolicy::Daily(QuotaStore::new(limit)),
            None => QuotaPolicy::Unlimited,
        }
    }

    pub fn daily_limit(&self) -> Option<u32> {
        match self {
            QuotaPolicy::Unlimited => None,
            QuotaPolicy::Daily(store) => Some(store.daily_limit()),
        }
    }
}
