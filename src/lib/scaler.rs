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

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Min-max normalization fitted once on training targets.
///
/// `transform` does not clamp: values outside `[min, max]` map outside
/// `[0, 1]`, so callers must not assume bounded output. The model relies on
/// this to extrapolate beyond the range it was trained on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ScalerState {
	pub min: f64,
	pub max: f64,
}

impl ScalerState {
	pub fn fit(values: &[f64]) -> Result<Self> {
		let (min, max) = values
			.iter()
			.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), each| {
				(min.min(*each), max.max(*each))
			});

		if values.is_empty() || !min.is_finite() || !max.is_finite() {
			return Err(Error::InvalidConfig(String::from(
				"scaler needs at least one finite value",
			)));
		}

		if min == max {
			return Err(Error::DegenerateRange { value: min });
		}

		Ok(Self { min, max })
	}

	pub fn range(&self) -> f64 {
		self.max - self.min
	}

	pub fn transform(&self, value: f64) -> f64 {
		(value - self.min) / self.range()
	}

	pub fn inverse_transform(&self, scaled: f64) -> f64 {
		scaled * self.range() + self.min
	}

	pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
		values.iter().map(|each| self.transform(*each)).collect()
	}
}
