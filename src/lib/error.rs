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
use std::{borrow::Cow, path::PathBuf};
use strum_macros::Display;
use thiserror::Error;

use crate::typedef::ErrorInfo;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Display, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
	Windowing,
	Training,
	Prediction,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestErrorKind {
	#[error("file type \"{0}\" is not supported")]
	UnsupportedFormat(String),

	#[error("the file cannot be read: {0}")]
	Unreadable(String),

	#[error("there is no {0} column")]
	MissingColumn(&'static str),

	#[error("no usable rows are left after dropping {dropped} invalid rows")]
	NoValidRows { dropped: usize },
}

#[derive(Error, Debug)]
pub enum Error {
	#[error("Cannot ingest \"{file}\": {kind}")]
	Ingest { file: String, kind: IngestErrorKind },

	#[error("Not enough data for {stage}: {available} points available, at least {required} required")]
	InsufficientData {
		stage: Stage,
		available: usize,
		required: usize,
	},

	#[error("Cannot scale a constant series (every value is {value})")]
	DegenerateRange { value: f64 },

	#[error("Training diverged at epoch {epoch}, loss is no longer finite")]
	TrainingDiverged { epoch: usize },

	#[error("Forecasting {horizon} steps past {last} runs beyond the supported calendar")]
	HorizonOutOfRange { horizon: usize, last: NaiveDate },

	#[error("No model artifact at {}", path.display())]
	ArtifactNotFound { path: PathBuf },

	#[error("Model artifact at {} is corrupt: {reason}", path.display())]
	ArtifactCorrupt { path: PathBuf, reason: String },

	#[error("Model weights cannot be encoded or decoded: {0}")]
	Weights(String),

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("No dataset named \"{0}\" has been ingested")]
	DatasetNotFound(String),

	#[error("I/O error at {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Background task failed: {0}")]
	Task(String),
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Error::Io {
			path: path.into(),
			source,
		}
	}

	pub(crate) fn ingest(file: impl Into<String>, kind: IngestErrorKind) -> Self {
		Error::Ingest {
			file: file.into(),
			kind,
		}
	}

	/// Builds the dialog payload shown to the user, naming the failed stage and
	/// the corrective action.
	pub fn info(&self) -> ErrorInfo {
		let (title, advice) = match self {
			Error::Ingest { .. } => (
				"Cannot Read Historical Data",
				"Upload a CSV or spreadsheet with a Date column and a numeric Close column",
			),
			Error::InsufficientData { .. } => (
				"Not Enough Rows",
				"Supply a longer history or shrink the window size",
			),
			Error::DegenerateRange { .. } => (
				"Unable to Spot The Pattern",
				"Pick a different file, a constant series cannot be trained on",
			),
			Error::TrainingDiverged { .. } => (
				"Training Failed",
				"Retry with a lower learning rate or a smaller batch size",
			),
			Error::HorizonOutOfRange { .. } => ("Horizon Too Long", "Shorten the forecast horizon"),
			Error::ArtifactNotFound { .. } => ("Model Not Trained", "Train the model first"),
			Error::ArtifactCorrupt { .. } => (
				"Potentially Corrupted",
				"Retrain the model to replace the damaged artifact",
			),
			Error::Weights(_) => (
				"Potentially Corrupted",
				"Retrain the model to produce fresh weights",
			),
			Error::InvalidConfig(_) => ("Invalid Settings", "Fix the highlighted setting and retry"),
			Error::DatasetNotFound(_) => ("Dataset Missing", "Upload the file again"),
			Error::Io { .. } => ("Cannot Access File", "Check the path and its permissions"),
			Error::Task(_) => ("Cannot Create New Process Thread", "Restart the application"),
		};

		ErrorInfo {
			title: Cow::Borrowed(title),
			message: format!("{}. {}.", self, advice),
		}
	}
}
