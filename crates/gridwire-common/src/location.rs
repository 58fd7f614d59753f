use std::fmt::{self, Display};

use once_cell::sync::Lazy;

// Column lookup table for common columns (A-ZZ = 702 columns)
static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// Convert a column letter (e.g., "A", "BC") to a 1-based column number.
pub fn column_to_number(column: &str) -> Option<u32> {
    let bytes = column.as_bytes();

    // Excel columns top out at XFD; anything longer than 3 letters is not a column.
    if bytes.is_empty() || bytes.len() > 3 {
        return None;
    }

    let mut result = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }
    Some(result)
}

/// Convert a 1-based column number to a column letter.
pub fn number_to_column(mut num: u32) -> String {
    if num > 0 && num <= 702 {
        return COLUMN_LOOKUP[(num - 1) as usize].clone();
    }

    let mut result = String::with_capacity(3);
    while num > 0 {
        num -= 1;
        result.insert(0, ((num % 26) as u8 + b'A') as char);
        num /= 26;
    }
    result
}

/// The key of one cell in the compiled circuit: `(sheet, column, row)`,
/// 1-based coordinates. Value-equal and hashable, so it can index the
/// cell arena and the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub sheet: String,
    pub col: u32,
    pub row: u32,
}

impl Location {
    pub fn new<S: Into<String>>(sheet: S, col: u32, row: u32) -> Self {
        Location {
            sheet: sheet.into(),
            col,
            row,
        }
    }

    /// A1-style cell part without the sheet prefix.
    pub fn a1(&self) -> String {
        format!("{}{}", number_to_column(self.col), self.row)
    }

    /// Deterministic register-name stem for this location, safe for
    /// netlist identifiers ("My Sheet", B2 becomes `My_Sheet_B2`).
    pub fn register_name(&self) -> String {
        let sheet: String = self
            .sheet
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}", sheet, self.a1())
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sheet.contains(' ') || self.sheet.contains('!') {
            write!(f, "'{}'!{}", self.sheet, self.a1())
        } else {
            write!(f, "{}!{}", self.sheet, self.a1())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_round_trip() {
        for (name, num) in [("A", 1), ("Z", 26), ("AA", 27), ("ZZ", 702), ("AAA", 703)] {
            assert_eq!(column_to_number(name), Some(num));
            assert_eq!(number_to_column(num), name);
        }
        assert_eq!(column_to_number("A1"), None);
        assert_eq!(column_to_number(""), None);
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::new("Sheet1", 2, 5).to_string(), "Sheet1!B5");
        assert_eq!(Location::new("my sheet", 1, 1).to_string(), "'my sheet'!A1");
    }

    #[test]
    fn register_name_is_identifier_safe() {
        assert_eq!(
            Location::new("my sheet", 28, 4).register_name(),
            "my_sheet_AB4"
        );
    }
}
