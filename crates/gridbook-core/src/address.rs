//! Cell address and range types
//!
//! Addresses are A1-style: column letters (A, B, …, Z, AA, …) followed by a
//! one-based row number. Internally rows and columns are zero-based.

use crate::error::{Error, Result};
use lazy_regex::regex_captures;
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "AB12")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., Z=25, AA=26)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address from zero-based indices
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse a cell address from canonical A1-style notation
    ///
    /// The input must already be uppercase; use [`normalize_address`] first
    /// for user input.
    ///
    /// # Examples
    /// ```
    /// use gridbook_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    ///
    /// assert!(CellAddress::parse("b2").is_err());
    /// assert!(CellAddress::parse("A0").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let (_, letters, digits) = regex_captures!(r"^([A-Z]+)(\d+)$", s)
            .ok_or_else(|| Error::InvalidAddress(format!("'{}' does not match [A-Z]+[0-9]+", s)))?;

        let col = Self::letters_to_column(letters)?;

        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        // Rows are 1-based in A1 notation
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }

        Ok(Self { row: row - 1, col })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u32) -> String {
        let mut result = String::new();
        let mut n = col as u64 + 1; // 1-based for calculation

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u32> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u64 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u64 - 'A' as u64 + 1);
            if col > u32::MAX as u64 {
                return Err(Error::InvalidAddress(format!(
                    "column '{}' out of range",
                    letters
                )));
            }
        }

        Ok((col - 1) as u32)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format!("{}{}", Self::column_to_letters(self.col), self.row as u64 + 1)
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Encode zero-based `(row, col)` as an A1-style address
pub fn encode(row: u32, col: u32) -> String {
    CellAddress::new(row, col).to_a1_string()
}

/// Decode an A1-style address into zero-based `(row, col)`
pub fn decode(address: &str) -> Result<(u32, u32)> {
    CellAddress::parse(address).map(|a| (a.row, a.col))
}

/// Canonical form of a user-supplied address: trimmed and uppercased
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// Whether `address` (after normalization) is a usable cell address
pub fn is_valid_address(address: &str) -> bool {
    CellAddress::parse(&normalize_address(address)).is_ok()
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range; corners may be given in any order
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        Self {
            start: CellAddress::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellAddress::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((start, end)) => Ok(Self::new(
                CellAddress::parse(start)?,
                CellAddress::parse(end)?,
            )),
            None => {
                let addr = CellAddress::parse(s)?;
                Ok(Self::new(addr, addr))
            }
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// The cells shared with `other`, if any
    pub fn intersection(&self, other: &CellRange) -> Option<CellRange> {
        let start = CellAddress::new(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
        );
        let end = CellAddress::new(
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        );
        (start.row <= end.row && start.col <= end.col).then_some(CellRange { start, end })
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u64 {
        (self.end.row - self.start.row) as u64 + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u64 {
        (self.end.col - self.start.col) as u64 + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() * self.col_count()
    }

    /// Iterate over every address in the range, row-major
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellAddress::new(row, col)))
    }

    /// Format as A1:B2
    pub fn to_a1_string(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellAddress::column_to_letters(0), "A");
        assert_eq!(CellAddress::column_to_letters(1), "B");
        assert_eq!(CellAddress::column_to_letters(25), "Z");
        assert_eq!(CellAddress::column_to_letters(26), "AA");
        assert_eq!(CellAddress::column_to_letters(27), "AB");
        assert_eq!(CellAddress::column_to_letters(701), "ZZ");
        assert_eq!(CellAddress::column_to_letters(702), "AAA");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellAddress::letters_to_column("Z").unwrap(), 25);
        assert_eq!(CellAddress::letters_to_column("AA").unwrap(), 26);
        assert_eq!(CellAddress::letters_to_column("ZZ").unwrap(), 701);
        assert_eq!(CellAddress::letters_to_column("AAA").unwrap(), 702);
        assert!(CellAddress::letters_to_column("").is_err());
        assert!(CellAddress::letters_to_column("ZZZZZZZZZZ").is_err());
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("A1").unwrap();
        assert_eq!((addr.row, addr.col), (0, 0));

        let addr = CellAddress::parse("AB12").unwrap();
        assert_eq!((addr.row, addr.col), (11, 27));
    }

    #[test]
    fn test_cell_address_parse_errors() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("a1").is_err());
        assert!(CellAddress::parse("$A$1").is_err());
        assert!(CellAddress::parse("A1B").is_err());
        assert!(CellAddress::parse("A99999999999").is_err());
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode(0, 0), "A1");
        assert_eq!(encode(8, 25), "Z9");
        assert_eq!(encode(99, 26), "AA100");
        assert_eq!(decode("Z9").unwrap(), (8, 25));
        assert!(decode("9Z").is_err());
    }

    #[test]
    fn test_is_valid_address() {
        assert!(is_valid_address("A1"));
        assert!(is_valid_address(" b12 "));
        assert!(!is_valid_address("A0"));
        assert!(!is_valid_address("1A"));
        assert!(!is_valid_address("A1:B2"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_cell_range_normalizes_corners() {
        let range = CellRange::parse("B3:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(2, 1));
        assert_eq!(range.cell_count(), 6);
    }

    #[test]
    fn test_cell_range_intersection() {
        let range = CellRange::parse("B2:XFD1048576").unwrap();
        let extent = CellRange::parse("A1:C4").unwrap();
        assert_eq!(range.intersection(&extent), Some(CellRange::parse("B2:C4").unwrap()));
        assert_eq!(extent.intersection(&range), range.intersection(&extent));
        assert_eq!(CellRange::parse("E5:F6").unwrap().intersection(&extent), None);
    }

    #[test]
    fn test_cell_range_cells_row_major() {
        let range = CellRange::parse("A1:B2").unwrap();
        let cells: Vec<String> = range.cells().map(|a| a.to_string()).collect();
        assert_eq!(cells, vec!["A1", "B1", "A2", "B2"]);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(row in 0u32..1_000_000, col in 0u32..20_000) {
            prop_assert_eq!(decode(&encode(row, col)).unwrap(), (row, col));
        }

        #[test]
        fn prop_encode_inverts_decode(letters in "[A-Z]{1,3}", row in 1u32..1_000_000) {
            let address = format!("{}{}", letters, row);
            let (r, c) = decode(&address).unwrap();
            prop_assert_eq!(encode(r, c), address);
        }
    }
}
