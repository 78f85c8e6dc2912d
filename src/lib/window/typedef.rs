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

use burn::config::Config;

use crate::error::{Error, Result};
use crate::scaler::ScalerState;

#[derive(Config, Debug)]
pub struct WindowConfig {
	/// Width `T` of every input window
	#[config(default = 30)]
	pub timesteps: usize,

	/// Fraction of samples held out from the tail for validation
	#[config(default = 0.2)]
	pub validation_split: f64,
}

impl WindowConfig {
	pub fn validate(&self) -> Result<()> {
		if self.timesteps == 0 {
			return Err(Error::InvalidConfig(String::from(
				"timesteps must be at least 1",
			)));
		}

		if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
			return Err(Error::InvalidConfig(format!(
				"validation_split must be between 0 and 1 exclusive, got {}",
				self.validation_split
			)));
		}

		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindowedSample {
	/// Position of the first input value in the source series
	pub start: usize,
	pub input: Vec<f64>,
	pub target: f64,
}

#[derive(Default, Clone, Debug)]
pub struct SplitDataset {
	pub train: Vec<WindowedSample>,
	pub validation: Vec<WindowedSample>,
}

/// Scaled, split samples ready for the trainer, along with the scaler that
/// produced them.
#[derive(Clone, Debug)]
pub struct PreparedData {
	pub split: SplitDataset,
	pub scaler: ScalerState,
	pub timesteps: usize,
}
