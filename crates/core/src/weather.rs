// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Weather hold records.

use crate::cp::CpId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An active weather hold on a CP.
///
/// Present only while the CP is held OutOfOrder by weather cause; cleared
/// by the weather-clear hook on the same CP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub cp_id: CpId,
    pub location: String,
    pub temperature: f64,
    pub raised_at: DateTime<Utc>,
    pub message: String,
}

impl WeatherAlert {
    pub fn new(cp_id: CpId, location: String, temperature: f64, raised_at: DateTime<Utc>) -> Self {
        let message = format!("{location}: {temperature:.1}C, charging suspended");
        Self { cp_id, location, temperature, raised_at, message }
    }
}
