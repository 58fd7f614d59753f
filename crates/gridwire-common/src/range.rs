use std::fmt::{self, Display};

use crate::location::{Location, number_to_column};

/// 1-based inclusive rectangle of cells, normalized so that the `min`
/// corner never exceeds the `max` corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl Bounds {
    pub fn new(col_a: u32, row_a: u32, col_b: u32, row_b: u32) -> Self {
        Bounds {
            min_col: col_a.min(col_b),
            min_row: row_a.min(row_b),
            max_col: col_a.max(col_b),
            max_row: row_a.max(row_b),
        }
    }

    pub fn single(col: u32, row: u32) -> Self {
        Bounds::new(col, row, col, row)
    }

    /// True when the rectangle collapses to one cell.
    pub fn is_single(&self) -> bool {
        self.min_col == self.max_col && self.min_row == self.max_row
    }

    pub fn rows(&self) -> impl Iterator<Item = u32> + use<> {
        self.min_row..=self.max_row
    }

    pub fn cols(&self) -> impl Iterator<Item = u32> + use<> {
        self.min_col..=self.max_col
    }
}

/// A cell or rectangular range reference as it appears in a formula. The
/// sheet is optional; a reference without one inherits the sheet of the
/// cell whose formula contains it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub bounds: Bounds,
}

impl RangeRef {
    pub fn new(sheet: Option<String>, bounds: Bounds) -> Self {
        RangeRef { sheet, bounds }
    }

    /// Expand into the member locations, row-major, resolving a missing
    /// sheet against `default_sheet`.
    pub fn locations(&self, default_sheet: &str) -> Vec<Location> {
        let sheet = self.sheet.as_deref().unwrap_or(default_sheet);
        let mut out = Vec::new();
        for row in self.bounds.rows() {
            for col in self.bounds.cols() {
                out.push(Location::new(sheet, col, row));
            }
        }
        out
    }
}

impl Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if sheet.contains(' ') {
                write!(f, "'{sheet}'!")?;
            } else {
                write!(f, "{sheet}!")?;
            }
        }
        let b = &self.bounds;
        write!(f, "{}{}", number_to_column(b.min_col), b.min_row)?;
        if !b.is_single() {
            write!(f, ":{}{}", number_to_column(b.max_col), b.max_row)?;
        }
        Ok(())
    }
}
