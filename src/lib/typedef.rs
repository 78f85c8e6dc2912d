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

use burn::backend::{Autodiff, NdArray};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap};

/// Backend the trained model runs on for validation, prediction and persistence.
pub type InferenceBackend = NdArray;

/// Backend used while fitting the model.
pub type TrainBackend = Autodiff<NdArray>;

/// User-facing failure description, `title` names the stage and `message`
/// says what went wrong and what to do about it.
#[derive(Default, Serialize, Clone, Debug, PartialEq)]
pub struct ErrorInfo {
	pub title: Cow<'static, str>,
	pub message: String,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub(crate) enum CellValue {
	#[default]
	Empty,
	String(String),
	Number(f64),
	Date(NaiveDate),
	Boolean(bool),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeSeriesRecord {
	pub date: NaiveDate,
	pub close: f64,
}

/// Cleaned daily closes of one source file, strictly increasing by date.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Dataset {
	name: String,
	records: Vec<TimeSeriesRecord>,
}

impl Dataset {
	/// Sorts observations by date, a later observation of the same date replaces
	/// the earlier one.
	pub fn from_observations<I>(name: impl Into<String>, observations: I) -> Self
	where
		I: IntoIterator<Item = TimeSeriesRecord>,
	{
		let by_date = observations
			.into_iter()
			.map(|each| (each.date, each.close))
			.collect::<BTreeMap<_, _>>();

		Self {
			name: name.into(),
			records: by_date
				.into_iter()
				.map(|(date, close)| TimeSeriesRecord { date, close })
				.collect(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn records(&self) -> &[TimeSeriesRecord] {
		&self.records
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn closes(&self) -> Vec<f64> {
		self.records.iter().map(|each| each.close).collect()
	}

	pub fn last_date(&self) -> Option<NaiveDate> {
		self.records.last().map(|each| each.date)
	}

	/// Keeps only the first `len` records, used to hold out a tail for back-testing.
	pub fn truncated(&self, len: usize) -> Self {
		Self {
			name: self.name.clone(),
			records: self.records.iter().take(len).cloned().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(date: &str, close: f64) -> TimeSeriesRecord {
		TimeSeriesRecord {
			date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
			close,
		}
	}

	#[test]
	fn observations_are_sorted_and_later_duplicate_wins() {
		let dataset = Dataset::from_observations(
			"prices.csv",
			[
				record("2023-01-03", 3.0),
				record("2023-01-01", 1.0),
				record("2023-01-02", 2.0),
				record("2023-01-01", 10.0),
			],
		);

		assert_eq!(dataset.len(), 3);
		assert_eq!(dataset.closes(), vec![10.0, 2.0, 3.0]);
		assert!(dataset
			.records()
			.windows(2)
			.all(|pair| pair[0].date < pair[1].date));
	}

	#[test]
	fn truncated_keeps_the_head() {
		let dataset = Dataset::from_observations(
			"prices.csv",
			[record("2023-01-01", 1.0), record("2023-01-02", 2.0)],
		);

		let head = dataset.truncated(1);
		assert_eq!(head.len(), 1);
		assert_eq!(head.name(), "prices.csv");
		assert_eq!(head.last_date(), Some(record("2023-01-01", 0.0).date));
	}
}
