// A1-style cell coordinates

use std::fmt;
use std::str::FromStr;

use crate::StoreError;

/// Largest row/column Excel addresses (1,048,576 rows × XFD columns).
const MAX_ROW: u32 = 1_048_576;
const MAX_COL: u32 = 16_384;

/// A single cell coordinate, 0-indexed internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse "B4", "aa10", "$C$2".
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        parse_a1(s).ok_or_else(|| StoreError::InvalidCell(s.to_string()))
    }

    /// 1-indexed row number as written in A1 notation.
    pub fn row_number(&self) -> u32 {
        self.row + 1
    }

    /// 1-indexed column number (A = 1).
    pub fn col_number(&self) -> u32 {
        self.col + 1
    }

    pub fn col_letters(&self) -> String {
        col_to_letters(self.col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col_letters(), self.row_number())
    }
}

impl FromStr for CellRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_a1(s: &str) -> Option<CellRef> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &s[col_start..i];
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let digits = &s[i..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Column letters to number (A=1, Z=26, AA=27)
    let mut col: u32 = 0;
    for ch in letters.bytes() {
        col = col * 26 + (ch.to_ascii_uppercase() - b'A' + 1) as u32;
    }
    let row: u32 = digits.parse().ok()?;

    if row == 0 || row > MAX_ROW || col > MAX_COL {
        return None;
    }
    Some(CellRef::new(row - 1, col - 1))
}

/// Convert 0-indexed column to letters (0 -> A, 25 -> Z, 26 -> AA)
pub(crate) fn col_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}
