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
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::error::{Error, Result};
use crate::typedef::{CellValue, Dataset};

/// Raw bytes of one uploaded file, the extension of `name` decides the parser.
#[derive(Clone, Debug)]
pub struct SourceFile {
	pub name: String,
	pub bytes: Vec<u8>,
}

impl SourceFile {
	pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
		Self {
			name: name.into(),
			bytes: bytes.into(),
		}
	}

	/// Name a file at `path` is registered under
	pub fn name_of(path: &Path) -> String {
		path.file_name()
			.and_then(|name| Some(name.to_str()?.to_string()))
			.unwrap_or(String::from("(unknown)"))
	}

	pub fn read(path: &Path) -> Result<Self> {
		let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;

		Ok(Self {
			name: Self::name_of(path),
			bytes,
		})
	}
}

#[derive(Display, EnumIter, PartialEq, Eq, Clone, Copy, Debug)]
#[strum(serialize_all = "lowercase")]
pub enum SourceFormat {
	Csv,
	Spreadsheet,
}

impl SourceFormat {
	pub fn extensions(&self) -> &'static [&'static str] {
		match self {
			SourceFormat::Csv => &["csv"],
			SourceFormat::Spreadsheet => &["xlsx", "xlsm", "xlsb", "xls", "xltx", "xltm", "ods"],
		}
	}

	pub fn from_extension(extension: &str) -> Option<Self> {
		let extension = extension.to_lowercase();
		SourceFormat::iter().find(|each| each.extensions().contains(&extension.as_str()))
	}
}

/// A successfully ingested file.
#[derive(Clone, Debug)]
pub struct IngestReport {
	pub dataset: Dataset,
	/// Rows without a parseable date or numeric close
	pub dropped_rows: usize,
	/// Rows replaced by a later row of the same date
	pub collapsed_duplicates: usize,
}

/// Per-file result, a failure never affects sibling files.
#[derive(Debug)]
pub struct IngestOutcome {
	pub file: String,
	pub result: Result<IngestReport>,
}

pub(super) struct Table {
	pub headers: Vec<String>,
	pub rows: Vec<Vec<CellValue>>,
	/// Rows the reader could not decode at all
	pub unreadable_rows: usize,
}

#[derive(Default, Clone, Copy)]
pub(super) struct ColumnCounter {
	pub date: u64,
	pub other: u64,
}
