//! Column-major event table with header-named string columns

use csv::{ReaderBuilder, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::{HockeyError, Result, Stage};

/// Raw event table: one row per shot attempt, cells kept as text
///
/// Values are parsed on demand by the stage that needs them, so columns a
/// stage does not read never cause errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventTable {
    headers: Vec<String>,
    columns: Vec<Vec<String>>,
}

impl EventTable {
    /// Create an empty table with the given headers
    pub fn new<S: Into<String>>(headers: Vec<S>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let columns = vec![Vec::new(); headers.len()];
        EventTable { headers, columns }
    }

    /// Build a table from named columns of equal length
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<String>)>) -> Result<Self> {
        let mut table = EventTable::default();
        for (name, values) in columns {
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    /// Load the season shot file
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            HockeyError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", path.as_ref().display(), e),
            ))
        })?;
        let table = Self::from_reader(file)?;
        log::info!(
            "Loaded {} events with {} columns from {}",
            table.n_rows(),
            table.n_columns(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse CSV with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = EventTable::new(headers);

        for record in reader.records() {
            let record = record?;
            for (column, cell) in table.columns.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        Ok(table)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in 0..self.n_rows() {
            writer.write_record(self.columns.iter().map(|c| c[row].as_str()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// True when every named column is present
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has_column(n))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Column lookup that fails with a schema error naming the stage
    pub fn require(&self, name: &str, stage: Stage) -> Result<&[String]> {
        self.column(name).ok_or_else(|| HockeyError::MissingColumn {
            column: name.to_string(),
            stage,
        })
    }

    /// Parse a required column as numbers; any unparseable cell is fatal
    pub fn numeric_column(&self, name: &str, stage: Stage) -> Result<Vec<f64>> {
        self.require(name, stage)?
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                parse_number(cell).ok_or_else(|| HockeyError::InvalidValue {
                    column: name.to_string(),
                    row,
                    value: cell.clone(),
                })
            })
            .collect()
    }

    /// Add a column, or replace it when the name already exists
    pub fn insert_column<S: Into<String>>(&mut self, name: S, values: Vec<String>) -> Result<()> {
        let name = name.into();
        if !self.headers.is_empty() && values.len() != self.n_rows() {
            return Err(HockeyError::LengthMismatch {
                column: name,
                expected: self.n_rows(),
                got: values.len(),
            });
        }

        match self.position(&name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.headers.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Copy of the table with headers renamed; names not present are ignored
    ///
    /// An existing column that already carries a target name is replaced, so
    /// no header appears twice.
    pub fn renamed(&self, renames: &[(&str, &str)]) -> Self {
        let mut table = self.clone();
        let replaced: Vec<usize> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                renames
                    .iter()
                    .any(|(from, to)| h.as_str() == *to && self.has_column(from))
                    && !renames.iter().any(|(from, _)| h.as_str() == *from)
            })
            .map(|(i, _)| i)
            .collect();
        for &i in replaced.iter().rev() {
            table.headers.remove(i);
            table.columns.remove(i);
        }
        for header in table.headers.iter_mut() {
            if let Some((_, to)) = renames.iter().find(|(from, _)| header.as_str() == *from) {
                *header = to.to_string();
            }
        }
        table
    }

    /// Copy of the table with rows in the given order
    pub fn take_rows(&self, order: &[usize]) -> Self {
        EventTable {
            headers: self.headers.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| order.iter().map(|&i| c[i].clone()).collect())
                .collect(),
        }
    }
}

/// Parse a numeric cell; blank and non-numeric cells yield None
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Largest float magnitude below which every integer is exact
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Parse an integral cell, accepting float spellings without a fraction ("5.0")
///
/// Float spellings outside the exactly representable range are rejected
/// rather than saturated.
pub fn parse_integer(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    parse_number(trimmed)
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_FLOAT)
        .map(|v| v as i64)
}

/// Shorthand for building string columns in tests and demos
pub fn strings<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> EventTable {
        EventTable::from_columns(vec![
            ("game_id", strings(&[1, 1, 2])),
            ("xGoal", strings(&["0.1", "0.25", ""])),
            ("team", strings(&["HOME", "AWAY", "HOME"])),
        ])
        .unwrap()
    }

    #[test]
    fn test_load_and_write_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shots.csv");
        std::fs::write(&path, "game_id,team,xGoal\n2023020001,HOME,0.05\n2023020001,AWAY,0.12\n")
            .unwrap();

        let table = EventTable::from_csv_path(&path).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.headers(), &["game_id", "team", "xGoal"]);
        assert_eq!(table.column("team").unwrap()[1], "AWAY");

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let reloaded = EventTable::from_reader(out.as_slice()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = EventTable::from_csv_path("/nonexistent/shots.csv");
        assert!(matches!(result, Err(HockeyError::Io(_))));
    }

    #[test]
    fn test_require_reports_stage() {
        let table = sample();
        match table.require("location", Stage::ZoneAndEntry) {
            Err(HockeyError::MissingColumn { column, stage }) => {
                assert_eq!(column, "location");
                assert_eq!(stage, Stage::ZoneAndEntry);
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_column_rejects_blank() {
        let table = sample();
        match table.numeric_column("xGoal", Stage::ExpectedGoals) {
            Err(HockeyError::InvalidValue { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_column_length_checked() {
        let mut table = sample();
        assert!(table.insert_column("extra", strings(&[1, 2])).is_err());
        table.insert_column("extra", strings(&[1, 2, 3])).unwrap();
        table.insert_column("extra", strings(&[4, 5, 6])).unwrap();
        assert_eq!(table.n_columns(), 4);
        assert_eq!(table.column("extra").unwrap()[0], "4");
    }

    #[test]
    fn test_renamed_and_take_rows() {
        let table = sample().renamed(&[("xGoal", "xg"), ("absent", "nothing")]);
        assert!(table.has_column("xg"));
        assert!(!table.has_column("xGoal"));

        let replaced = sample().renamed(&[("xGoal", "team")]);
        assert_eq!(replaced.headers(), &["game_id", "team"]);
        assert_eq!(replaced.column("team").unwrap(), &["0.1", "0.25", ""]);
        let kept = sample().renamed(&[("absent", "team")]);
        assert_eq!(kept, sample());

        let reordered = table.take_rows(&[2, 0, 1]);
        assert_eq!(reordered.column("team").unwrap(), &["HOME", "HOME", "AWAY"]);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_number(" 1.5 "), Some(1.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_integer("5"), Some(5));
        assert_eq!(parse_integer("4.0"), Some(4));
        assert_eq!(parse_integer("4.5"), None);
        assert_eq!(parse_integer("n/a"), None);
        assert_eq!(parse_integer("1e19"), None);
        assert_eq!(parse_integer("-1e300"), None);
        assert_eq!(parse_integer("1e3"), Some(1000));
    }
}
