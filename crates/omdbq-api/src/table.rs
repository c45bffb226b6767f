//! Flattened search results and CSV rendering.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::{SearchHit, TitleDetails};

/// Columns every search result table starts with, in order.
pub const BASE_COLUMNS: [&str; 5] = ["Title", "Year", "imdbID", "Type", "Poster"];

/// A single result row: column name to cell text.
pub type Row = BTreeMap<String, String>;

/// Row-oriented table of search results.
///
/// Columns keep insertion order: [`BASE_COLUMNS`] first, then any detail
/// columns in the order they were first merged. A row may lack a cell for
/// a column; such cells read as `None` and render empty in CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    total_results: Option<u32>,
}

impl ResultTable {
    /// Builds a table of base columns from search hits.
    pub(crate) fn from_hits(hits: Vec<SearchHit>, total_results: Option<u32>) -> Self {
        let rows = hits
            .into_iter()
            .map(|hit| {
                Row::from([
                    (String::from("Title"), hit.title),
                    (String::from("Year"), hit.year),
                    (String::from("imdbID"), hit.imdb_id),
                    (String::from("Type"), hit.kind),
                    (String::from("Poster"), hit.poster),
                ])
            })
            .collect();

        Self {
            columns: BASE_COLUMNS.iter().map(|c| String::from(*c)).collect(),
            rows,
            total_results,
        }
    }

    /// Merges detail fields into the row at `index`, overwriting existing
    /// cells and appending unseen columns. Out-of-range indexes are ignored.
    pub(crate) fn merge_row(&mut self, index: usize, details: TitleDetails) {
        for key in details.keys() {
            if !self.columns.contains(key) {
                self.columns.push(key.clone());
            }
        }
        if let Some(row) = self.rows.get_mut(index) {
            row.extend(details);
        }
    }

    /// IMDb IDs of all rows, in row order.
    pub(crate) fn imdb_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get("imdbID").cloned().unwrap_or_default())
            .collect()
    }

    /// Column names in display order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total hit count reported by OMDb across all pages.
    #[must_use]
    pub const fn total_results(&self) -> Option<u32> {
        self.total_results
    }

    /// Returns the cell at (`row`, `column`).
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    /// Writes the table as CSV: a header row, then one record per row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `writer` fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        wtr.write_record(&self.columns)
            .context("failed to write CSV header")?;

        for (index, row) in self.rows.iter().enumerate() {
            let record = self
                .columns
                .iter()
                .map(|column| row.get(column).map_or("", String::as_str));
            wtr.write_record(record)
                .with_context(|| format!("failed to write CSV record {index}"))?;
        }

        wtr.flush().context("failed to flush CSV output")?;
        Ok(())
    }

    /// Renders the table as a CSV string.
    ///
    /// # Errors
    ///
    /// Returns an error if CSV serialization fails.
    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).context("CSV output is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    fn hit(title: &str, year: &str, imdb_id: &str) -> SearchHit {
        SearchHit {
            title: String::from(title),
            year: String::from(year),
            imdb_id: String::from(imdb_id),
            kind: String::from("movie"),
            poster: String::from("N/A"),
        }
    }

    #[test]
    fn test_from_hits_has_base_columns() {
        // Arrange
        let hits = vec![
            hit("Batman", "1989", "tt0096895"),
            hit("Batman Begins", "2005", "tt0372784"),
        ];

        // Act
        let table = ResultTable::from_hits(hits, Some(632));

        // Assert
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns(), BASE_COLUMNS);
        assert_eq!(table.get(1, "imdbID"), Some("tt0372784"));
        assert_eq!(table.total_results(), Some(632));
    }

    #[test]
    fn test_merge_row_appends_columns_once() {
        // Arrange
        let mut table = ResultTable::from_hits(
            vec![hit("A", "2001", "tt1"), hit("B", "2002", "tt2")],
            None,
        );
        let details = TitleDetails::from([
            (String::from("Director"), String::from("Someone")),
            (String::from("Title"), String::from("A (Director's Cut)")),
        ]);

        // Act
        table.merge_row(0, details.clone());
        table.merge_row(1, details);

        // Assert
        assert_eq!(table.columns().len(), BASE_COLUMNS.len() + 1);
        assert_eq!(table.columns()[5], "Director");
        assert_eq!(table.get(0, "Title"), Some("A (Director's Cut)"));
        assert_eq!(table.get(1, "Director"), Some("Someone"));
    }

    #[test]
    fn test_merge_row_out_of_range_is_ignored() {
        // Arrange
        let mut table = ResultTable::from_hits(vec![hit("A", "2001", "tt1")], None);

        // Act
        table.merge_row(
            3,
            TitleDetails::from([(String::from("Plot"), String::from("x"))]),
        );

        // Assert
        assert_eq!(table.len(), 1);
        assert!(table.get(0, "Plot").is_none());
    }

    #[test]
    fn test_to_csv_header_and_rows() {
        // Arrange
        let table = ResultTable::from_hits(
            vec![hit("Batman, the Movie", "1966", "tt0060153")],
            None,
        );

        // Act
        let csv = table.to_csv().unwrap();

        // Assert
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Title,Year,imdbID,Type,Poster");
        assert_eq!(lines[1], "\"Batman, the Movie\",1966,tt0060153,movie,N/A");
    }

    #[test]
    fn test_to_csv_missing_cells_are_empty() {
        // Arrange
        let mut table = ResultTable::from_hits(
            vec![hit("A", "2001", "tt1"), hit("B", "2002", "tt2")],
            None,
        );
        table.merge_row(
            0,
            TitleDetails::from([(String::from("Rated"), String::from("R"))]),
        );

        // Act
        let csv = table.to_csv().unwrap();

        // Assert
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Title,Year,imdbID,Type,Poster,Rated");
        assert_eq!(lines[1], "A,2001,tt1,movie,N/A,R");
        assert_eq!(lines[2], "B,2002,tt2,movie,N/A,");
    }

    #[test]
    fn test_empty_table_csv_is_header_only() {
        // Arrange
        let table = ResultTable::from_hits(Vec::new(), Some(0));

        // Act
        let csv = table.to_csv().unwrap();

        // Assert
        assert!(table.is_empty());
        assert_eq!(csv, "Title,Year,imdbID,Type,Poster\n");
    }

    #[test]
    fn test_table_json_roundtrip_preserves_column_order() {
        // Arrange
        let mut table = ResultTable::from_hits(vec![hit("A", "2001", "tt1")], Some(1));
        table.merge_row(
            0,
            TitleDetails::from([(String::from("Awards"), String::from("N/A"))]),
        );

        // Act
        let json = serde_json::to_string(&table).unwrap();
        let parsed: ResultTable = serde_json::from_str(&json).unwrap();

        // Assert
        assert_eq!(parsed, table);
        assert_eq!(parsed.columns().last().map(String::as_str), Some("Awards"));
    }
}
