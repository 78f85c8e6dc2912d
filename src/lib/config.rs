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
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::train::typedef::TrainingConfig;
use crate::window::typedef::WindowConfig;

#[derive(Config)]
pub struct PipelineConfig {
	#[config(default = "WindowConfig::new()")]
	pub window: WindowConfig,

	#[config(default = "TrainingConfig::new()")]
	pub training: TrainingConfig,

	#[config(default = "PathBuf::from(\"artifacts/model.artifact\")")]
	pub artifact_path: PathBuf,

	/// How many trailing observations a back-test holds out
	#[config(default = 20)]
	pub backtest_steps: usize,
}

impl PipelineConfig {
	/// Reads a JSON config when `path` exists, falls back to defaults otherwise.
	pub fn load_or_default(path: &Path) -> Result<Self> {
		let config = if path.exists() {
			info!(path = %path.display(), "loading pipeline config");
			PipelineConfig::load(path).map_err(|err| Error::InvalidConfig(err.to_string()))?
		} else {
			debug!(path = %path.display(), "config file absent, using defaults");
			PipelineConfig::new()
		};

		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		self.window.validate()?;
		self.training.validate()?;

		if self.backtest_steps == 0 {
			return Err(Error::InvalidConfig(String::from(
				"backtest_steps must be at least 1",
			)));
		}

		Ok(())
	}
}
