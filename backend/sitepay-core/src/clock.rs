// src/clock.rs

use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};

/// Source of "today" for processing dates.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current_date: Arc<Mutex<NaiveDate>>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            current_date: Arc::new(Mutex::new(date)),
        }
    }

    pub fn set_date(&self, date: NaiveDate) {
        if let Ok(mut current) = self.current_date.lock() {
            *current = date;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.current_date.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
