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

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parse_datetime::parse_datetime;
use std::io::Cursor;

use super::typedef::*;
use crate::error::IngestErrorKind;
use crate::typedef::{CellValue, TimeSeriesRecord};

const DATE_HEADER: &'static str = "date";
const CLOSE_HEADER: &'static str = "close";

const DATE_FORMATS: [&'static str; 7] = [
	"%Y-%m-%d",
	"%Y/%m/%d",
	"%m/%d/%Y",
	"%d.%m.%Y",
	"%d-%b-%Y",
	"%b %d, %Y",
	"%Y%m%d",
];

const DATETIME_FORMATS: [&'static str; 3] =
	["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

pub(super) fn parse_number(cell: &str) -> Option<f64> {
	let cleaned = cell
		.trim()
		.trim_start_matches('$')
		.chars()
		.filter(|each| *each != ',')
		.collect::<String>();

	cleaned.parse::<f64>().ok().filter(|found| found.is_finite())
}

pub(super) fn parse_date(cell: &str) -> Option<NaiveDate> {
	let cell = cell.trim();

	if let Some(found) = DATE_FORMATS
		.iter()
		.find_map(|format| NaiveDate::parse_from_str(cell, format).ok())
	{
		return Some(found);
	}

	if let Ok(found) = DateTime::parse_from_rfc3339(cell) {
		return Some(found.date_naive());
	}

	if let Some(found) = DATETIME_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(cell, format).ok())
	{
		return Some(found.date());
	}

	// Free-form dates such as "5 January 2023", anything without a digit would
	// be relative to today and break re-ingest determinism
	if cell.chars().any(|each| each.is_ascii_digit()) {
		return parse_datetime(cell).ok().map(|found| found.date_naive());
	}

	None
}

pub(super) fn parse_cell(cell: &str) -> CellValue {
	let cell = cell.trim();
	if cell.is_empty() {
		CellValue::Empty
	} else if let Some(number_value) = parse_number(cell) {
		CellValue::Number(number_value)
	} else if let Some(date_value) = parse_date(cell) {
		CellValue::Date(date_value)
	} else if let Ok(boolean_value) = cell.to_lowercase().parse::<bool>() {
		CellValue::Boolean(boolean_value)
	} else {
		CellValue::String(cell.to_string())
	}
}

fn convert_spreadsheet_cell(cell: &Data) -> CellValue {
	match cell {
		Data::Empty => CellValue::Empty,
		Data::Int(_) | Data::Float(_) => cell.as_f64().map(CellValue::Number).unwrap_or_default(),
		Data::DateTime(_) | Data::DateTimeIso(_) => {
			cell.as_date().map(CellValue::Date).unwrap_or_default()
		}
		Data::Bool(value) => CellValue::Boolean(*value),
		Data::String(text) => parse_cell(text),
		_ => CellValue::String(cell.to_string()),
	}
}

fn normalize_header(header: &str) -> String {
	header.trim().trim_start_matches('\u{feff}').to_lowercase()
}

pub(super) fn read_csv(bytes: &[u8]) -> Result<Table, IngestErrorKind> {
	let mut reader = csv::ReaderBuilder::new()
		.flexible(true)
		.trim(csv::Trim::All)
		.from_reader(bytes);

	let headers = reader
		.headers()
		.map_err(|err| IngestErrorKind::Unreadable(err.to_string()))?
		.iter()
		.map(|each| each.to_string())
		.collect::<Vec<_>>();

	let mut unreadable_rows = 0usize;
	let rows = reader
		.records()
		.filter_map(|each| match each {
			Ok(row) => Some(row.iter().map(parse_cell).collect::<Vec<_>>()),
			Err(_) => {
				unreadable_rows += 1;
				None
			}
		})
		.collect::<Vec<_>>();

	Ok(Table {
		headers,
		rows,
		unreadable_rows,
	})
}

/// Reads the first worksheet that carries a Close header.
pub(super) fn read_spreadsheet(bytes: &[u8]) -> Result<Table, IngestErrorKind> {
	let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
		.map_err(|err| IngestErrorKind::Unreadable(err.to_string()))?;

	for tab_name in sheets.sheet_names() {
		let sheet = match sheets.worksheet_range(&tab_name) {
			Ok(ok) => ok,
			Err(_) => continue,
		};

		let headers = match sheet.headers() {
			Some(found) => found,
			None => continue,
		};

		if find_close_column(&headers).is_none() {
			continue;
		}

		let rows = sheet
			.rows()
			.skip(1) // Skip header row
			.map(|each| each.iter().map(convert_spreadsheet_cell).collect::<Vec<_>>())
			.collect::<Vec<_>>();

		return Ok(Table {
			headers,
			rows,
			unreadable_rows: 0,
		});
	}

	Err(IngestErrorKind::MissingColumn("Close"))
}

pub(super) fn find_close_column(headers: &[String]) -> Option<usize> {
	headers
		.iter()
		.position(|each| normalize_header(each) == CLOSE_HEADER)
}

/// Prefers a column named "date", otherwise the column where date cells
/// outnumber everything else.
pub(super) fn find_date_column(table: &Table, close_index: usize) -> Option<usize> {
	if let Some(found) = table
		.headers
		.iter()
		.position(|each| normalize_header(each) == DATE_HEADER)
	{
		return Some(found);
	}

	let column_count = table.headers.len();
	let counters = table.rows.iter().fold(
		std::iter::repeat_n(ColumnCounter::default(), column_count).collect::<Vec<_>>(),
		|mut counters, each_row| {
			for (counter, each_cell) in counters.iter_mut().zip(each_row) {
				match each_cell {
					CellValue::Date(_) => counter.date += 1,
					CellValue::Empty => {}
					_ => counter.other += 1,
				}
			}

			counters
		},
	);

	counters
		.iter()
		.enumerate()
		.filter(|(index, each)| *index != close_index && each.date > 0 && each.date > each.other)
		.max_by_key(|(_, each)| each.date)
		.map(|(index, _)| index)
}

/// Returns the rows holding both a date and a finite close, plus how many
/// rows were dropped.
pub(super) fn extract_observations(
	table: &Table,
	date_index: usize,
	close_index: usize,
) -> (Vec<TimeSeriesRecord>, usize) {
	let mut dropped = table.unreadable_rows;
	let observations = table
		.rows
		.iter()
		.filter_map(|each_row| {
			let date = match each_row.get(date_index) {
				Some(CellValue::Date(found)) => *found,
				_ => {
					dropped += 1;
					return None;
				}
			};

			let close = match each_row.get(close_index) {
				Some(CellValue::Number(found)) if found.is_finite() => *found,
				_ => {
					dropped += 1;
					return None;
				}
			};

			Some(TimeSeriesRecord { date, close })
		})
		.collect::<Vec<_>>();

	(observations, dropped)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cells_are_typed() {
		assert_eq!(parse_cell(" 102.5 "), CellValue::Number(102.5));
		assert_eq!(parse_cell("$1,234.50"), CellValue::Number(1234.5));
		assert_eq!(
			parse_cell("2023-01-05"),
			CellValue::Date(NaiveDate::from_ymd_opt(2023, 1, 5).unwrap())
		);
		assert_eq!(parse_cell("TRUE"), CellValue::Boolean(true));
		assert_eq!(parse_cell(""), CellValue::Empty);
		assert_eq!(parse_cell("n/a"), CellValue::String(String::from("n/a")));
	}

	#[test]
	fn common_date_layouts_parse() {
		let expected = NaiveDate::from_ymd_opt(2023, 3, 7);
		for each in [
			"2023-03-07",
			"2023/03/07",
			"03/07/2023",
			"07.03.2023",
			"07-Mar-2023",
			"Mar 07, 2023",
			"2023-03-07T16:00:00Z",
			"2023-03-07 16:00:00",
		] {
			assert_eq!(parse_date(each), expected, "{}", each);
		}

		assert_eq!(parse_date("yesterday"), None);
		assert_eq!(parse_date("not a date"), None);
	}

	#[test]
	fn non_finite_numbers_are_rejected() {
		assert_eq!(parse_number("NaN"), None);
		assert_eq!(parse_number("inf"), None);
		assert_eq!(parse_number("abc"), None);
	}

	#[test]
	fn date_column_found_by_header_or_votes() {
		let table = read_csv(b"Day,Open,CLOSE\n2023-01-01,1,2\n2023-01-02,1,3\n").unwrap();
		let close = find_close_column(&table.headers).unwrap();
		assert_eq!(close, 2);
		assert_eq!(find_date_column(&table, close), Some(0));

		let table = read_csv(b"Open,Date,Close\n1,x,2\n").unwrap();
		assert_eq!(find_date_column(&table, 2), Some(1));
	}

	#[test]
	fn invalid_rows_are_counted() {
		let table =
			read_csv(b"Date,Close\n2023-01-01,1\nbad,2\n2023-01-03,\n2023-01-04,abc\n2023-01-05,5\n")
				.unwrap();
		let (observations, dropped) = extract_observations(&table, 0, 1);

		assert_eq!(observations.len(), 2);
		assert_eq!(dropped, 3);
	}

	#[test]
	fn workbook_uses_first_sheet_with_close() {
		// Sheet "Notes" has no Close header, "Prices" holds date-formatted cells
		let table = read_spreadsheet(include_bytes!("../../../tests/fixtures/prices.xlsx")).unwrap();

		assert_eq!(table.headers, vec!["Date", "Close"]);
		assert_eq!(table.rows.len(), 5);
		assert_eq!(
			table.rows[0][0],
			CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
		);
		assert_eq!(table.rows[0][1], CellValue::Number(101.5));
		assert_eq!(table.rows[3][1], CellValue::Empty);
	}

	#[test]
	fn garbage_workbook_is_unreadable() {
		assert!(matches!(
			read_spreadsheet(b"definitely not a zip archive"),
			Err(IngestErrorKind::Unreadable(_))
		));
	}
}
