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

use burn::{backend::ndarray::NdArrayDevice, tensor::Tensor};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

use super::typedef::*;
use crate::scaler::ScalerState;
use crate::train::model::LstmNetwork;
use crate::typedef::{Dataset, InferenceBackend};

/// Runs the network `horizon` times, each step feeding its own prediction
/// back as the newest input. Errors compound over the horizon.
///
/// `seed` holds raw closes, exactly as many as the network's input window.
pub(super) fn rollout(
	network: &LstmNetwork<InferenceBackend>,
	scaler: &ScalerState,
	seed: &[f64],
	horizon: usize,
) -> Vec<f64> {
	let timesteps = seed.len();
	if horizon == 0 || timesteps == 0 {
		return Vec::new();
	}

	let device = NdArrayDevice::Cpu;

	// Shift this window left and put the newest prediction at its end
	let mut tensor = Tensor::<InferenceBackend, 1>::from_floats(
		scaler.transform_all(seed).as_slice(),
		&device,
	)
	.reshape([1, timesteps, 1]);

	let future_tensors = (0..horizon)
		.map(|_| {
			let (predicted, _) = network.forward(&tensor, None);
			let newest = predicted.clone().reshape([1, 1, 1]);

			tensor = if timesteps > 1 {
				Tensor::cat(
					[tensor.clone().slice([0..1, 1..timesteps, 0..1]), newest].to_vec(),
					1,
				)
			} else {
				newest
			};

			predicted.flatten::<1>(0, 1)
		})
		.collect::<Vec<_>>();

	Tensor::cat(future_tensors, 0)
		.into_data()
		.iter::<f64>()
		.map(|scaled| scaler.inverse_transform(scaled))
		.collect()
}

/// Most common gap between consecutive dates, at least one day. Ties go to
/// the shorter gap.
pub(super) fn date_step(series: &Dataset) -> u64 {
	let gaps = series
		.records()
		.windows(2)
		.map(|pair| (pair[1].date - pair[0].date).num_days())
		.filter(|gap| *gap > 0)
		.fold(BTreeMap::<i64, usize>::new(), |mut counter, gap| {
			*counter.entry(gap).or_default() += 1;
			counter
		});

	gaps.into_iter()
		.fold(None, |best: Option<(i64, usize)>, (gap, count)| match best {
			Some((_, best_count)) if best_count >= count => best,
			_ => Some((gap, count)),
		})
		.map(|(gap, _)| gap as u64)
		.unwrap_or(1)
		.max(1)
}

/// `count` dates after `last`, `None` when any of them falls off the calendar.
pub(super) fn future_dates(last: NaiveDate, step: u64, count: usize) -> Option<Vec<NaiveDate>> {
	(1..=count as u64)
		.map(|index| last.checked_add_days(Days::new(step.checked_mul(index)?)))
		.collect()
}

/// The last `count` observations as actual-only records.
pub(super) fn history(series: &Dataset, count: usize) -> Vec<PredictionRecord> {
	let records = series.records();
	records[records.len().saturating_sub(count)..]
		.iter()
		.map(|each| PredictionRecord {
			date: each.date,
			actual: Some(each.close),
			predicted: None,
		})
		.collect()
}

pub(super) fn trend(reference: f64, records: &[PredictionRecord]) -> Option<Trend> {
	let end = records.iter().rev().find_map(|each| each.predicted)?;

	Some(if end > reference {
		Trend::Bullish
	} else if end < reference {
		Trend::Bearish
	} else {
		Trend::Neutral
	})
}

fn direction(change: f64) -> i8 {
	if change > 0.0 {
		1
	} else if change < 0.0 {
		-1
	} else {
		0
	}
}

/// Compares predicted against actual values. Direction of change at step 0
/// is measured from `reference`, the last close before the compared range.
pub(super) fn diagnose(reference: f64, records: &[PredictionRecord]) -> Option<Diagnostics> {
	let pairs = records
		.iter()
		.filter_map(|each| Some((each.actual?, each.predicted?)))
		.collect::<Vec<_>>();

	if pairs.is_empty() {
		return None;
	}

	let count = pairs.len() as f64;
	let absolute_sum = pairs
		.iter()
		.map(|(actual, predicted)| (predicted - actual).abs())
		.sum::<f64>();
	let squared_sum = pairs
		.iter()
		.map(|(actual, predicted)| (predicted - actual).powi(2))
		.sum::<f64>();

	let mut previous = reference;
	let matching = pairs
		.iter()
		.filter(|(actual, predicted)| {
			let matched = direction(actual - previous) == direction(predicted - previous);
			previous = *actual;
			matched
		})
		.count();

	Some(Diagnostics {
		compared_steps: pairs.len(),
		mean_absolute_error: absolute_sum / count,
		root_mean_squared_error: (squared_sum / count).sqrt(),
		directional_accuracy: matching as f64 / count,
	})
}

/// Highest and lowest predicted points, the first one wins on ties.
pub(super) fn find_peaks(records: &[PredictionRecord]) -> [Option<PredictionRecord>; 2] {
	records.iter().filter(|each| each.predicted.is_some()).fold(
		[Option::<PredictionRecord>::None; 2],
		|[last_max, last_min], each| {
			let predicted = each.predicted.unwrap_or_default();
			let last_max_predicted = last_max
				.and_then(|found| found.predicted)
				.unwrap_or(f64::MIN);
			let last_min_predicted = last_min
				.and_then(|found| found.predicted)
				.unwrap_or(f64::MAX);

			let max = if predicted > last_max_predicted {
				Some(*each)
			} else {
				last_max.or(Some(*each))
			};

			let min = if predicted < last_min_predicted {
				Some(*each)
			} else {
				last_min.or(Some(*each))
			};

			[max, min]
		},
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::typedef::TimeSeriesRecord;

	fn date(text: &str) -> NaiveDate {
		NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
	}

	fn record(day: &str, actual: Option<f64>, predicted: Option<f64>) -> PredictionRecord {
		PredictionRecord {
			date: date(day),
			actual,
			predicted,
		}
	}

	#[test]
	fn weekday_series_steps_one_day() {
		// Mon..Fri, then Mon..Wed: four 1-day gaps and one 3-day gap, then two more
		let days = [
			"2024-01-01",
			"2024-01-02",
			"2024-01-03",
			"2024-01-04",
			"2024-01-05",
			"2024-01-08",
			"2024-01-09",
			"2024-01-10",
		];
		let series = Dataset::from_observations(
			"prices.csv",
			days.iter().map(|each| TimeSeriesRecord {
				date: date(each),
				close: 1.0,
			}),
		);

		assert_eq!(date_step(&series), 1);
	}

	#[test]
	fn weekly_series_steps_seven_days() {
		let series = Dataset::from_observations(
			"weekly.csv",
			(0..6).map(|index| TimeSeriesRecord {
				date: date("2024-01-01") + Days::new(7 * index),
				close: index as f64,
			}),
		);

		assert_eq!(date_step(&series), 7);
		assert_eq!(
			future_dates(date("2024-02-05"), 7, 2),
			Some(vec![date("2024-02-12"), date("2024-02-19")])
		);
	}

	#[test]
	fn single_record_falls_back_to_one_day() {
		let series = Dataset::from_observations(
			"short.csv",
			[TimeSeriesRecord {
				date: date("2024-01-01"),
				close: 1.0,
			}],
		);

		assert_eq!(date_step(&series), 1);
	}

	#[test]
	fn dates_past_the_calendar_end_are_refused() {
		let last = NaiveDate::MAX - Days::new(2);

		assert_eq!(future_dates(last, 1, 2).map(|found| found.len()), Some(2));
		assert_eq!(future_dates(last, 1, 3), None);
	}

	#[test]
	fn history_keeps_the_tail_as_actual_only() {
		let series = Dataset::from_observations(
			"prices.csv",
			(0..4).map(|index| TimeSeriesRecord {
				date: date("2024-01-01") + Days::new(index),
				close: index as f64,
			}),
		);

		let tail = history(&series, 2);
		assert_eq!(tail.len(), 2);
		assert_eq!(tail[0].date, date("2024-01-03"));
		assert!(tail.iter().all(|each| each.actual.is_some() && each.predicted.is_none()));
		assert_eq!(history(&series, 10).len(), 4);
	}

	#[test]
	fn trend_follows_the_final_prediction() {
		let records = [
			record("2024-01-01", Some(10.0), None),
			record("2024-01-02", None, Some(8.0)),
			record("2024-01-03", None, Some(11.0)),
		];

		assert_eq!(trend(10.0, &records), Some(Trend::Bullish));
		assert_eq!(trend(12.0, &records), Some(Trend::Bearish));
		assert_eq!(trend(11.0, &records), Some(Trend::Neutral));
		assert_eq!(trend(10.0, &records[..1]), None);
	}

	#[test]
	fn diagnostics_compare_direction_against_previous_actual() {
		let records = [
			// up 10→12, predicted up
			record("2024-01-02", Some(12.0), Some(11.0)),
			// down 12→11, predicted up
			record("2024-01-03", Some(11.0), Some(13.0)),
			// up 11→14, predicted up
			record("2024-01-04", Some(14.0), Some(14.0)),
			// down 14→13, predicted down
			record("2024-01-05", Some(13.0), Some(12.0)),
		];

		let diagnostics = diagnose(10.0, &records).unwrap();

		assert_eq!(diagnostics.compared_steps, 4);
		assert!((diagnostics.mean_absolute_error - 1.0).abs() < 1e-12);
		assert!((diagnostics.root_mean_squared_error - (6.0f64 / 4.0).sqrt()).abs() < 1e-12);
		assert!((diagnostics.directional_accuracy - 0.75).abs() < 1e-12);
	}

	#[test]
	fn forecast_without_actuals_has_no_diagnostics() {
		let records = [record("2024-01-02", None, Some(1.0))];
		assert_eq!(diagnose(1.0, &records), None);
	}

	#[test]
	fn peaks_ignore_historical_points() {
		let records = [
			record("2024-01-01", Some(100.0), None),
			record("2024-01-02", None, Some(5.0)),
			record("2024-01-03", None, Some(9.0)),
			record("2024-01-04", None, Some(2.0)),
			record("2024-01-05", None, Some(9.0)),
		];

		let [high, low] = find_peaks(&records);

		assert_eq!(high.unwrap().date, date("2024-01-03"));
		assert_eq!(low.unwrap().date, date("2024-01-04"));
		assert_eq!(find_peaks(&[]), [None, None]);
	}
}
