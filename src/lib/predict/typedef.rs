/*
 * Market::Trend, an LSTM market trend forecasting core
 * Copyright (C) 2025 Athaariq A. Ramadhani <foss@athaariq.my.id>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// One point of a forecast. `actual` is absent past the end of known data,
/// `predicted` is absent for purely historical points.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
	pub date: NaiveDate,
	pub actual: Option<f64>,
	pub predicted: Option<f64>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
	pub compared_steps: usize,
	pub mean_absolute_error: f64,
	pub root_mean_squared_error: f64,
	/// Fraction of steps whose predicted direction of change matches the
	/// actual one
	pub directional_accuracy: f64,
}

/// Direction of the forecast's final value against the last close it was
/// seeded from.
#[derive(Display, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
	Bullish,
	Bearish,
	Neutral,
}

/// Chart-ready forecast: the seed window as actual-only records, followed by
/// the forecasted steps.
#[derive(Default, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
	pub records: Vec<PredictionRecord>,
	pub diagnostics: Option<Diagnostics>,
	/// Resistance
	pub high_peak: Option<PredictionRecord>,
	/// Support
	pub low_peak: Option<PredictionRecord>,
	pub trend: Option<Trend>,
}
