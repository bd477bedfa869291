use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::survey::io_common::{non_blank, RawRow, RawTable};
use crate::survey::*;

fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty => None,
        DataType::Error(e) => {
            debug!("cell_text: error cell {:?}", e);
            None
        }
        DataType::String(s) => non_blank(s),
        DataType::Int(i) => Some(i.to_string()),
        // Integer-valued floats are written without the decimal part.
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        x => non_blank(&x.to_string()),
    }
}

fn get_range(path: &Path, worksheet_name: Option<&str>) -> SurveyResult<calamine::Range<DataType>> {
    let p = path.display().to_string();
    debug!("get_range: path: {:?} worksheet: {:?}", p, worksheet_name);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let range_o = match worksheet_name {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    let name = worksheet_name.unwrap_or("<first worksheet>");
    let range = range_o
        .context(MissingWorksheetSnafu {
            name,
            path: p.clone(),
        })?
        .context(OpeningExcelSnafu { path: p })?;
    Ok(range)
}

/// Reads a table from an Excel worksheet. The first row is the header.
pub fn read_excel_table(
    name: &str,
    path: &Path,
    worksheet_name: Option<&str>,
) -> SurveyResult<RawTable> {
    info!("Reading table {} from {:?}", name, path);
    let wrange = get_range(path, worksheet_name)?;
    let mut iter = wrange.rows();
    let header: Vec<String> = match iter.next() {
        Some(row) => row
            .iter()
            .map(|c| cell_text(c).unwrap_or_default())
            .collect(),
        None => {
            return EmptyTableSnafu {
                table: name,
                path: path.display().to_string(),
            }
            .fail()
        }
    };
    debug!("read_excel_table: {}: header: {:?}", name, header);

    let rows: Vec<RawRow> = iter
        .enumerate()
        .map(|(idx, row)| RawRow {
            lineno: idx + 2,
            cells: row.iter().map(cell_text).collect(),
        })
        .collect();
    info!("Read {} rows for table {}", rows.len(), name);
    Ok(RawTable {
        name: name.to_string(),
        path: path.display().to_string(),
        header,
        rows,
    })
}
