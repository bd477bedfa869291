use crate::survey::*;

use std::path::Path;

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// One data row of a table, with the line it was read from.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RawRow {
    pub lineno: usize,
    /// Blank cells are None.
    pub cells: Vec<Option<String>>,
}

impl RawRow {
    /// The trimmed content of a cell, if the column exists and the cell is not blank.
    pub fn get(&self, column: Option<usize>) -> Option<&str> {
        column
            .and_then(|idx| self.cells.get(idx))
            .and_then(|c| c.as_deref())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// A table as read from a file, before any typing.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RawTable {
    pub name: String,
    pub path: String,
    pub header: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn optional_column(&self, column: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(column))
    }

    pub fn column(&self, column: &str) -> SurveyResult<usize> {
        self.optional_column(column).context(MissingColumnSnafu {
            table: self.name.clone(),
            column,
            path: self.path.clone(),
        })
    }
}

pub fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Parses an integer cell. Spreadsheet exports often write integers as floats (1987.0).
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    t.parse::<i64>().ok().or_else(|| {
        t.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15)
            .map(|f| f as i64)
    })
}

pub fn parse_id(s: &str) -> Option<u64> {
    parse_int(s).and_then(|x| u64::try_from(x).ok())
}

pub fn parse_question_id(s: &str) -> Option<QuestionId> {
    parse_int(s).and_then(|x| QuestionId::try_from(x).ok())
}

pub fn parse_year(s: &str) -> Option<i32> {
    parse_int(s).and_then(|x| i32::try_from(x).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_from_text_and_floats() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" 1987.0 "), Some(1987));
        assert_eq!(parse_int("1987.5"), None);
        assert_eq!(parse_int("NaN"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_year("1e3"), Some(1000));
    }

    #[test]
    fn columns_and_cells() {
        let table = RawTable {
            name: "users".to_string(),
            path: "users.csv".to_string(),
            header: vec!["id".to_string(), " Year ".to_string()],
            rows: vec![RawRow {
                lineno: 2,
                cells: vec![Some("1".to_string()), Some("  ".to_string())],
            }],
        };
        assert_eq!(table.column("year").unwrap(), 1);
        assert_eq!(table.optional_column("state"), None);
        assert!(table.column("state").is_err());
        let row = &table.rows[0];
        assert_eq!(row.get(Some(0)), Some("1"));
        assert_eq!(row.get(Some(1)), None);
        assert_eq!(row.get(Some(7)), None);
        assert_eq!(row.get(None), None);
        assert_eq!(simplify_file_name(Path::new("/a/b/users.csv")), "users.csv");
    }
}
