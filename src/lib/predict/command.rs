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

use std::path::Path;
use tracing::{debug, info};

use super::helper::*;
use super::typedef::*;
use crate::artifact::{command::write_atomically, typedef::ModelArtifact};
use crate::error::{Error, Result, Stage};
use crate::typedef::Dataset;

fn insufficient(available: usize, required: usize) -> Error {
	Error::InsufficientData {
		stage: Stage::Prediction,
		available,
		required,
	}
}

/// Forecasts `horizon` steps past the end of `series`.
///
/// The last `input_timesteps` closes seed the window and every later step
/// consumes the previous prediction instead of an observed value, so error
/// accumulates the further out a record is. Dates advance by the series'
/// most common gap, a horizon running off the calendar is an error rather
/// than a shorter forecast. `actual` is always absent.
pub fn predict(
	artifact: &ModelArtifact,
	series: &Dataset,
	horizon: usize,
) -> Result<Vec<PredictionRecord>> {
	let timesteps = artifact.input_timesteps;
	let last_date = match series.last_date() {
		Some(found) if series.len() >= timesteps => found,
		_ => return Err(insufficient(series.len(), timesteps)),
	};

	if horizon == 0 {
		return Ok(Vec::new());
	}

	let dates = future_dates(last_date, date_step(series), horizon).ok_or(
		Error::HorizonOutOfRange {
			horizon,
			last: last_date,
		},
	)?;

	let closes = series.closes();
	let seed = &closes[closes.len() - timesteps..];
	let network = artifact.network()?;
	let predicted = rollout(&network, &artifact.scaler, seed, horizon);

	debug!(
		dataset = series.name(),
		horizon,
		first = ?dates.first(),
		"rolled out forecast"
	);

	Ok(dates
		.into_iter()
		.zip(predicted)
		.map(|(date, value)| PredictionRecord {
			date,
			actual: None,
			predicted: Some(value),
		})
		.collect())
}

/// Closes the report around `forecasted`: the seed window goes first as
/// actual-only records, then peaks and trend are read off the forecast.
fn report(
	artifact: &ModelArtifact,
	seen: &Dataset,
	forecasted: Vec<PredictionRecord>,
	diagnostics: Option<Diagnostics>,
) -> ForecastReport {
	let [high_peak, low_peak] = find_peaks(&forecasted);
	let current_trend = seen
		.records()
		.last()
		.and_then(|found| trend(found.close, &forecasted));

	let mut records = history(seen, artifact.input_timesteps);
	records.extend(forecasted);

	ForecastReport {
		records,
		diagnostics,
		high_peak,
		low_peak,
		trend: current_trend,
	}
}

pub fn forecast(artifact: &ModelArtifact, series: &Dataset, horizon: usize) -> Result<ForecastReport> {
	let forecasted = predict(artifact, series, horizon)?;
	Ok(report(artifact, series, forecasted, None))
}

/// Holds out the last `steps` observations, forecasts them from the window
/// right before, and scores the forecast against what actually happened.
pub fn backtest(artifact: &ModelArtifact, series: &Dataset, steps: usize) -> Result<ForecastReport> {
	let required = artifact.input_timesteps + steps;
	if series.len() < required || series.is_empty() {
		return Err(insufficient(series.len(), required));
	}

	let cutoff = series.len() - steps;
	let seen = series.truncated(cutoff);
	let held_out = &series.records()[cutoff..];

	let forecasted = predict(artifact, &seen, steps)?
		.into_iter()
		.zip(held_out)
		.map(|(forecasted, observed)| PredictionRecord {
			date: observed.date,
			actual: Some(observed.close),
			predicted: forecasted.predicted,
		})
		.collect::<Vec<_>>();

	let reference = seen
		.records()
		.last()
		.map(|found| found.close)
		.ok_or_else(|| insufficient(series.len(), required))?;
	let diagnostics = diagnose(reference, &forecasted);

	if let Some(found) = &diagnostics {
		info!(
			dataset = series.name(),
			steps = found.compared_steps,
			mae = found.mean_absolute_error,
			rmse = found.root_mean_squared_error,
			directional_accuracy = found.directional_accuracy,
			"back-test finished"
		);
	}

	Ok(report(artifact, &seen, forecasted, diagnostics))
}

/// Writes the report as `date,actual,predicted` rows, absent values stay empty.
pub fn export_csv(report: &ForecastReport, destination: &Path) -> Result<()> {
	let mut writer = csv::Writer::from_writer(Vec::new());
	let as_io = |err: csv::Error| Error::io(destination, err.into());

	writer
		.write_record(["date", "actual", "predicted"])
		.map_err(as_io)?;

	for each in &report.records {
		let actual = each.actual.map(|found| found.to_string()).unwrap_or_default();
		let predicted = each
			.predicted
			.map(|found| found.to_string())
			.unwrap_or_default();

		writer
			.write_record([each.date.to_string(), actual, predicted])
			.map_err(as_io)?;
	}

	let bytes = writer
		.into_inner()
		.map_err(|err| Error::io(destination, err.into_error()))?;
	write_atomically(destination, &bytes)?;

	info!(
		path = %destination.display(),
		rows = report.records.len(),
		"forecast exported"
	);
	Ok(())
}

#[cfg(test)]
mod tests {
	use burn::backend::ndarray::NdArrayDevice;
	use chrono::{Days, NaiveDate};

	use super::*;
	use crate::scaler::ScalerState;
	use crate::train::{
		model::{LstmNetwork, LstmNetworkConfig},
		typedef::{TrainingResult, TrainingSummary},
	};
	use crate::typedef::{InferenceBackend, TimeSeriesRecord};

	const TIMESTEPS: usize = 5;

	fn artifact() -> ModelArtifact {
		let model_config = LstmNetworkConfig::new().with_hidden_size(4);
		let model: LstmNetwork<InferenceBackend> = model_config.init(&NdArrayDevice::Cpu);

		ModelArtifact::from_training(
			&TrainingResult {
				model,
				model_config,
				scaler: ScalerState {
					min: 100.0,
					max: 200.0,
				},
				timesteps: TIMESTEPS,
				metrics: Vec::new(),
				summary: TrainingSummary::default(),
			},
			"prices.csv",
		)
		.unwrap()
	}

	fn first_day() -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
	}

	fn series(len: u64) -> Dataset {
		Dataset::from_observations(
			"prices.csv",
			(0..len).map(|index| TimeSeriesRecord {
				date: first_day() + Days::new(index),
				close: 100.0 + (index as f64 * 0.7).sin() * 50.0 + 50.0,
			}),
		)
	}

	#[test]
	fn five_step_forecast_continues_after_last_date() {
		let series = series(40);
		let records = predict(&artifact(), &series, 5).unwrap();

		assert_eq!(records.len(), 5);

		let mut previous = series.last_date().unwrap();
		for each in &records {
			assert!(each.date > previous);
			assert!(each.actual.is_none());
			assert!(each.predicted.is_some_and(f64::is_finite));
			previous = each.date;
		}
		assert_eq!(records[0].date, first_day() + Days::new(40));
	}

	#[test]
	fn forecast_is_deterministic_for_one_artifact() {
		let artifact = artifact();
		let series = series(20);

		assert_eq!(
			predict(&artifact, &series, 3).unwrap(),
			predict(&artifact, &series, 3).unwrap()
		);
	}

	#[test]
	fn rollout_prefix_does_not_depend_on_horizon() {
		let artifact = artifact();
		let series = series(20);

		let short = predict(&artifact, &series, 2).unwrap();
		let long = predict(&artifact, &series, 6).unwrap();

		assert_eq!(short[..], long[..2]);
	}

	#[test]
	fn series_shorter_than_window_is_rejected() {
		let result = predict(&artifact(), &series(TIMESTEPS as u64 - 1), 5);

		assert!(matches!(
			result,
			Err(Error::InsufficientData {
				stage: Stage::Prediction,
				available: 4,
				required: TIMESTEPS,
			})
		));
	}

	#[test]
	fn exactly_one_window_is_enough() {
		let records = predict(&artifact(), &series(TIMESTEPS as u64), 1).unwrap();
		assert_eq!(records.len(), 1);
	}

	#[test]
	fn zero_horizon_yields_nothing() {
		assert!(predict(&artifact(), &series(10), 0).unwrap().is_empty());
	}

	#[test]
	fn forecast_report_leads_with_the_seed_window() {
		let series = series(10);
		let report = forecast(&artifact(), &series, 4).unwrap();

		assert_eq!(report.records.len(), TIMESTEPS + 4);
		assert!(report.diagnostics.is_none());

		let (seen, forecasted) = report.records.split_at(TIMESTEPS);
		for (each, observed) in seen.iter().zip(&series.records()[10 - TIMESTEPS..]) {
			assert_eq!(each.date, observed.date);
			assert_eq!(each.actual, Some(observed.close));
			assert_eq!(each.predicted, None);
		}

		let high = report.high_peak.unwrap().predicted.unwrap();
		let low = report.low_peak.unwrap().predicted.unwrap();
		for each in forecasted {
			assert_eq!(each.actual, None);
			let predicted = each.predicted.unwrap();
			assert!(low <= predicted && predicted <= high);
		}

		let last_close = series.records()[9].close;
		let end = forecasted[3].predicted.unwrap();
		let expected = if end > last_close {
			Trend::Bullish
		} else if end < last_close {
			Trend::Bearish
		} else {
			Trend::Neutral
		};
		assert_eq!(report.trend, Some(expected));
	}

	#[test]
	fn empty_forecast_has_no_trend() {
		let report = forecast(&artifact(), &series(10), 0).unwrap();

		assert_eq!(report.records.len(), TIMESTEPS);
		assert_eq!(report.trend, None);
		assert_eq!(report.high_peak, None);
	}

	#[test]
	fn horizon_past_the_calendar_is_an_error() {
		let series = Dataset::from_observations(
			"far.csv",
			(0..TIMESTEPS as u64).map(|index| TimeSeriesRecord {
				date: NaiveDate::MAX - Days::new(TIMESTEPS as u64 + 1 - index),
				close: 100.0 + index as f64,
			}),
		);

		assert_eq!(predict(&artifact(), &series, 2).unwrap().len(), 2);
		assert!(matches!(
			predict(&artifact(), &series, 3),
			Err(Error::HorizonOutOfRange { horizon: 3, .. })
		));
	}

	#[test]
	fn backtest_scores_the_held_out_tail() {
		let series = series(30);
		let report = backtest(&artifact(), &series, 8).unwrap();

		assert_eq!(report.records.len(), TIMESTEPS + 8);
		let (seen, scored) = report.records.split_at(TIMESTEPS);
		assert!(seen.iter().all(|each| each.predicted.is_none()));
		assert_eq!(seen[TIMESTEPS - 1].date, series.records()[21].date);

		for (each, observed) in scored.iter().zip(&series.records()[22..]) {
			assert_eq!(each.date, observed.date);
			assert_eq!(each.actual, Some(observed.close));
			assert!(each.predicted.is_some());
		}

		let diagnostics = report.diagnostics.unwrap();
		assert_eq!(diagnostics.compared_steps, 8);
		assert!(diagnostics.mean_absolute_error >= 0.0);
		assert!(diagnostics.root_mean_squared_error >= diagnostics.mean_absolute_error);
		assert!((0.0..=1.0).contains(&diagnostics.directional_accuracy));
		assert!(report.trend.is_some());
	}

	#[test]
	fn backtest_needs_window_plus_steps() {
		assert!(matches!(
			backtest(&artifact(), &series(10), 6),
			Err(Error::InsufficientData { required: 11, .. })
		));
	}

	#[test]
	fn exported_csv_keeps_absent_values_empty() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out").join("forecast.csv");
		let report = ForecastReport {
			records: vec![
				PredictionRecord {
					date: first_day(),
					actual: Some(101.5),
					predicted: Some(99.25),
				},
				PredictionRecord {
					date: first_day() + Days::new(1),
					actual: None,
					predicted: Some(98.0),
				},
			],
			..Default::default()
		};

		export_csv(&report, &path).unwrap();

		assert_eq!(
			std::fs::read_to_string(&path).unwrap(),
			"date,actual,predicted\n2024-03-01,101.5,99.25\n2024-03-02,,98\n"
		);
	}
}
