// Primitives for reading CSV files.

use std::path::Path;

use crate::survey::io_common::{non_blank, simplify_file_name, RawRow, RawTable};
use crate::survey::*;

/// Reads a CSV table with a header row.
///
/// Rows that cannot be parsed are skipped with a warning.
pub fn read_csv_table(name: &str, path: &Path) -> SurveyResult<RawTable> {
    let p = path.display().to_string();
    info!("Reading table {} from {:?}", name, p);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvReadSnafu { path: p.clone() })?;

    let header: Vec<String> = rdr
        .headers()
        .context(CsvReadSnafu { path: p.clone() })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if header.iter().all(|h| h.is_empty()) {
        return EmptyTableSnafu { table: name, path: p }.fail();
    }
    debug!("read_csv_table: {}: header: {:?}", name, header);

    let mut rows: Vec<RawRow> = Vec::new();
    let mut skipped: usize = 0;
    for (idx, line_r) in rdr.records().enumerate() {
        match line_r {
            Ok(line) => {
                let lineno = line
                    .position()
                    .map(|pos| pos.line() as usize)
                    .unwrap_or(idx + 2);
                rows.push(RawRow {
                    lineno,
                    cells: line.iter().map(non_blank).collect(),
                });
            }
            Err(e) => {
                skipped += 1;
                warn!(
                    "{}: skipping malformed row {}: {}",
                    simplify_file_name(path),
                    idx + 2,
                    e
                );
            }
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {} malformed rows", simplify_file_name(path), skipped);
    }
    info!("Read {} rows for table {}", rows.len(), name);
    Ok(RawTable {
        name: name.to_string(),
        path: p,
        header,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("choices.csv");
        fs::write(
            &path,
            "\u{feff}id,question_id,value\n10,2,soda\n11,2\n12,2,\"pop, or soda\"\n13,2,\n",
        )
        .unwrap();
        let table = read_csv_table("choices", &path).unwrap();
        assert_eq!(table.header, vec!["id", "question_id", "value"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].lineno, 2);
        assert_eq!(table.rows[1].cells[2].as_deref(), Some("pop, or soda"));
        assert_eq!(table.rows[2].cells[2], None);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = read_csv_table("users", &dir.path().join("nope.csv"));
        assert!(matches!(res, Err(SurveyError::CsvRead { .. })));
    }
}
