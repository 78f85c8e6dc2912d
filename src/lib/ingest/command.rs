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

use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::helper::*;
use super::typedef::*;
use crate::error::{Error, IngestErrorKind, Result};
use crate::typedef::Dataset;

/// Parses one file into a cleaned, date-ordered dataset.
pub fn ingest_file(file: &SourceFile) -> Result<IngestReport> {
	let fail = |kind: IngestErrorKind| Error::ingest(&file.name, kind);

	let extension = Path::new(&file.name)
		.extension()
		.and_then(|found| found.to_str())
		.unwrap_or_default();

	let format = SourceFormat::from_extension(extension)
		.ok_or_else(|| fail(IngestErrorKind::UnsupportedFormat(extension.to_string())))?;

	let table = match format {
		SourceFormat::Csv => read_csv(&file.bytes),
		SourceFormat::Spreadsheet => read_spreadsheet(&file.bytes),
	}
	.map_err(fail)?;

	let close_index =
		find_close_column(&table.headers).ok_or_else(|| fail(IngestErrorKind::MissingColumn("Close")))?;
	let date_index = find_date_column(&table, close_index)
		.ok_or_else(|| fail(IngestErrorKind::MissingColumn("Date")))?;

	let (observations, dropped_rows) = extract_observations(&table, date_index, close_index);
	if observations.is_empty() {
		return Err(fail(IngestErrorKind::NoValidRows {
			dropped: dropped_rows,
		}));
	}

	let observation_count = observations.len();
	let dataset = Dataset::from_observations(file.name.clone(), observations);
	let collapsed_duplicates = observation_count - dataset.len();

	if dropped_rows > 0 {
		warn!(
			file = file.name.as_str(),
			dropped_rows, "data cleaning dropped rows without a date or close"
		);
	}

	info!(
		file = file.name.as_str(),
		%format,
		records = dataset.len(),
		collapsed_duplicates,
		"ingested historical data"
	);

	Ok(IngestReport {
		dataset,
		dropped_rows,
		collapsed_duplicates,
	})
}

async fn collect_outcomes(
	tasks: Vec<(String, JoinHandle<Result<IngestReport>>)>,
) -> Vec<IngestOutcome> {
	let mut outcomes = Vec::with_capacity(tasks.len());
	for (file, task) in tasks {
		let result = match task.await {
			Ok(ok) => ok,
			Err(err) => Err(Error::Task(err.to_string())),
		};

		if let Err(err) = &result {
			warn!(file = file.as_str(), "{}", err);
		}

		outcomes.push(IngestOutcome { file, result });
	}

	outcomes
}

/// Ingests every file on the blocking pool in parallel. Outcomes come back in
/// input order, one per file, and a failing file never aborts its siblings.
pub async fn ingest(files: Vec<SourceFile>) -> Vec<IngestOutcome> {
	let tasks = files
		.into_iter()
		.map(|each| {
			let name = each.name.clone();
			(name, tokio::task::spawn_blocking(move || ingest_file(&each)))
		})
		.collect::<Vec<_>>();

	collect_outcomes(tasks).await
}

/// Same as `ingest`, reading each file from disk first. A path that cannot be
/// read fails on its own like a file that cannot be parsed.
pub async fn ingest_paths(paths: Vec<PathBuf>) -> Vec<IngestOutcome> {
	let tasks = paths
		.into_iter()
		.map(|path| {
			let name = SourceFile::name_of(&path);
			let task = tokio::task::spawn_blocking(move || {
				SourceFile::read(&path).and_then(|each| ingest_file(&each))
			});
			(name, task)
		})
		.collect::<Vec<_>>();

	collect_outcomes(tasks).await
}
