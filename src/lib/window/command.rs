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

use tracing::debug;

use super::typedef::*;
use crate::error::{Error, Result, Stage};
use crate::scaler::ScalerState;
use crate::typedef::Dataset;

/// Slides a `timesteps` wide window over `closes`, producing `N - T` samples
/// whose target is the value right after the window.
pub fn make_windows(closes: &[f64], timesteps: usize) -> Result<Vec<WindowedSample>> {
	if timesteps == 0 {
		return Err(Error::InvalidConfig(String::from(
			"timesteps must be at least 1",
		)));
	}

	if closes.len() <= timesteps {
		return Err(Error::InsufficientData {
			stage: Stage::Windowing,
			available: closes.len(),
			required: timesteps + 1,
		});
	}

	Ok(closes
		.windows(timesteps + 1)
		.enumerate()
		.map(|(start, each)| WindowedSample {
			start,
			input: each[..timesteps].to_vec(),
			target: each[timesteps],
		})
		.collect())
}

/// Number of tail samples reserved for validation.
pub fn validation_count(sample_count: usize, validation_split: f64) -> usize {
	// Relative slack absorbs representation error such as 0.2 * 70 landing
	// just above 14, and keeps tiny products above zero
	let raw = validation_split * sample_count as f64 * (1.0 - 1e-9);
	(raw.ceil().max(0.0) as usize).min(sample_count)
}

/// Splits samples into a training head and a validation tail, never shuffling
/// across the boundary.
pub fn split_samples(
	mut samples: Vec<WindowedSample>,
	validation_split: f64,
) -> Result<SplitDataset> {
	let validation_len = validation_count(samples.len(), validation_split);
	let train_len = samples.len() - validation_len;
	if train_len == 0 {
		return Err(Error::InsufficientData {
			stage: Stage::Windowing,
			available: samples.len(),
			required: validation_len + 1,
		});
	}

	let validation = samples.split_off(train_len);
	Ok(SplitDataset {
		train: samples,
		validation,
	})
}

pub fn scale_sample(sample: &WindowedSample, scaler: &ScalerState) -> WindowedSample {
	WindowedSample {
		start: sample.start,
		input: scaler.transform_all(&sample.input),
		target: scaler.transform(sample.target),
	}
}

/// Windows the dataset, fits the scaler on training targets, then scales and
/// splits every sample.
pub fn prepare(dataset: &Dataset, config: &WindowConfig) -> Result<PreparedData> {
	config.validate()?;

	let samples = make_windows(&dataset.closes(), config.timesteps)?;
	let raw = split_samples(samples, config.validation_split)?;

	let train_targets = raw.train.iter().map(|each| each.target).collect::<Vec<_>>();
	let scaler = ScalerState::fit(&train_targets)?;

	let scale_all = |samples: &[WindowedSample]| {
		samples
			.iter()
			.map(|each| scale_sample(each, &scaler))
			.collect::<Vec<_>>()
	};
	let split = SplitDataset {
		train: scale_all(&raw.train),
		validation: scale_all(&raw.validation),
	};

	debug!(
		dataset = dataset.name(),
		train = split.train.len(),
		validation = split.validation.len(),
		min = scaler.min,
		max = scaler.max,
		"prepared windows"
	);

	Ok(PreparedData {
		split,
		scaler,
		timesteps: config.timesteps,
	})
}
