use serde::Serialize;

use super::utils::parse_cell_ref;

static EMPTY: CellValue = CellValue::Empty;

/// Raw value of a single worksheet cell, as decoded from the upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Falsy values are `Empty`, `""`, `0`, `NaN` and `false`.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Bool(b) => *b,
        }
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// The used range of a worksheet. `rows[0][0]` sits at `origin`, and every
/// cell before it reads as `Empty` without being stored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Sheet {
    pub name: String,
    pub origin: (usize, usize),
    pub rows: Vec<Vec<CellValue>>,
    #[serde(skip)]
    width: usize,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self::with_origin(name, (0, 0), rows)
    }

    pub fn with_origin(name: impl Into<String>, origin: (usize, usize), rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .map_or(0, |w| origin.1 + w);
        Self {
            name: name.into(),
            origin,
            rows,
            width,
        }
    }

    /// Rows counted from A1, including the unstored ones above `origin`.
    pub fn row_count(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.origin.0 + self.rows.len()
        }
    }

    /// Columns counted from A1 in `row`. Rows above `origin` span the full
    /// sheet width, like the blank rows of a dense grid.
    pub fn row_width(&self, row: usize) -> usize {
        match row.checked_sub(self.origin.0) {
            None => self.width,
            Some(offset) => self.rows.get(offset).map_or(0, |r| self.origin.1 + r.len()),
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        let (Some(row), Some(col)) = (row.checked_sub(self.origin.0), col.checked_sub(self.origin.1)) else {
            return &EMPTY;
        };
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Looks a cell up by its A1-style reference ("B7", "AL65").
    pub fn cell_by_ref(&self, reference: &str) -> &CellValue {
        match parse_cell_ref(reference) {
            Some((row, col)) => self.cell(row, col),
            None => &EMPTY,
        }
    }
}

/// One tab of the uploaded workbook. Tabs the decoder could not read keep
/// their name and the reason so they can be reported back as skipped.
#[derive(Debug, Clone)]
pub struct WorksheetEntry {
    pub name: String,
    pub sheet: Result<Sheet, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub entries: Vec<WorksheetEntry>,
}

impl Workbook {
    #[cfg(test)]
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self {
            entries: sheets
                .into_iter()
                .map(|sheet| WorksheetEntry {
                    name: sheet.name.clone(),
                    sheet: Ok(sheet),
                })
                .collect(),
        }
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sheet {
        Sheet::new(
            "Data",
            vec![
                vec!["A1".into(), "B1".into()],
                vec![CellValue::Empty, 2.5.into()],
            ],
        )
    }

    #[test]
    fn test_cell_out_of_bounds_is_empty() {
        let sheet = sample();
        assert_eq!(sheet.cell(1, 1), &CellValue::Number(2.5));
        assert!(sheet.cell(5, 0).is_empty());
        assert!(sheet.cell(0, 9).is_empty());
    }

    #[test]
    fn test_cell_by_ref_uses_same_grid() {
        let sheet = sample();
        assert_eq!(sheet.cell_by_ref("B1"), &CellValue::Text("B1".to_string()));
        assert_eq!(sheet.cell_by_ref("B2"), sheet.cell(1, 1));
        assert!(sheet.cell_by_ref("not a ref").is_empty());
    }

    #[test]
    fn test_origin_offsets_lookups() {
        let sheet = Sheet::with_origin(
            "Far",
            (20_000, 300),
            vec![vec![CellValue::Number(7.0), "x".into()]],
        );

        assert_eq!(sheet.row_count(), 20_001);
        assert_eq!(sheet.cell(20_000, 300), &CellValue::Number(7.0));
        assert_eq!(sheet.cell(20_000, 301), &CellValue::Text("x".to_string()));
        assert!(sheet.cell(0, 0).is_empty());
        assert!(sheet.cell(20_000, 299).is_empty());
        assert_eq!(sheet.row_width(9), 302);
        assert_eq!(sheet.row_width(20_000), 302);
        assert_eq!(sheet.row_width(20_001), 0);
    }

    #[test]
    fn test_empty_sheet_has_no_rows() {
        let sheet = Sheet::with_origin("Blank", (5, 5), Vec::new());
        assert_eq!(sheet.row_count(), 0);
        assert_eq!(sheet.row_width(0), 0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!CellValue::Empty.is_truthy());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(!CellValue::Text(String::new()).is_truthy());
        assert!(!CellValue::Bool(false).is_truthy());
        assert!(CellValue::Text("0".to_string()).is_truthy());
        assert!(CellValue::Number(-1.0).is_truthy());
    }

    #[test]
    fn test_display_drops_integer_fraction() {
        assert_eq!(CellValue::Number(70.0).display(), "70");
        assert_eq!(CellValue::Number(0.7).display(), "0.7");
        assert_eq!(CellValue::Bool(true).display(), "true");
    }

    #[test]
    fn test_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            CellValue::Empty,
            CellValue::Number(1.5),
            CellValue::Text("x".to_string()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1.5,"x"]"#);
    }
}
