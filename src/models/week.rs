// src/models/week.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Represents the 'weeks' table: one school week of assigned lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub id: i64,

    #[serde(default)]
    pub label: Option<String>,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Week {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

/// Query params for listing weeks.
#[derive(Debug, Deserialize)]
pub struct WeekListParams {
    pub limit: Option<usize>,
}
