use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A spreadsheet column, stored as a 0-based index and displayed as a letter (`A`, `B`, ... `Z`,
/// `AA`, ...).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Column(usize);

impl Column {
    pub const A: Column = Column(0);
    pub const B: Column = Column(1);
    pub const C: Column = Column(2);
    pub const D: Column = Column(3);
    pub const E: Column = Column(4);
    pub const F: Column = Column(5);
    pub const G: Column = Column(6);
    pub const H: Column = Column(7);
    pub const I: Column = Column(8);
    pub const J: Column = Column(9);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The 0-based position of this column within a row.
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Returns the cell of `row` in this column, or `None` when the row is too short.
    pub fn get<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        row.get(self.0).map(|s| s.as_str())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut n = self.0 + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        let s: String = letters.into_iter().rev().collect();
        f.write_str(&s)
    }
}

impl FromStr for Column {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("A column must have at least one letter");
        }
        let mut n: usize = 0;
        for c in s.chars() {
            if !c.is_ascii_alphabetic() {
                anyhow::bail!("Invalid column letter '{c}' in '{s}'");
            }
            let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            n = n
                .checked_mul(26)
                .and_then(|n| n.checked_add(value))
                .ok_or_else(|| anyhow::anyhow!("Column '{s}' is out of range"))?;
        }
        Ok(Column(n - 1))
    }
}

impl Serialize for Column {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Column::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_display() {
        assert_eq!(Column::A.to_string(), "A");
        assert_eq!(Column::J.to_string(), "J");
        assert_eq!(Column::new(25).to_string(), "Z");
        assert_eq!(Column::new(26).to_string(), "AA");
        assert_eq!(Column::new(701).to_string(), "ZZ");
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!("A".parse::<Column>().unwrap(), Column::A);
        assert_eq!("j".parse::<Column>().unwrap(), Column::J);
        assert_eq!("AA".parse::<Column>().unwrap(), Column::new(26));
        assert!("".parse::<Column>().is_err());
        assert!("A1".parse::<Column>().is_err());
    }

    #[test]
    fn test_column_get_short_row() {
        let row = vec!["x".to_string(), "y".to_string()];
        assert_eq!(Column::B.get(&row), Some("y"));
        assert_eq!(Column::J.get(&row), None);
    }

    #[test]
    fn test_column_serde() {
        let json = serde_json::to_string(&Column::E).unwrap();
        assert_eq!(json, r#""E""#);
        let back: Column = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Column::E);
    }
}
