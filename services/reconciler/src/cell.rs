//! Tagged tabular cell
//!
//! Source tables mix numbers, free text and sentinel strings in the same
//! column. Every field is carried as a `Cell` and resolved explicitly by the
//! coercion step that owns it.

use calamine::Data;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Absent,
}

impl Cell {
    /// Build a cell from delimited-text input. Blank text is `Absent`.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Absent
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::String(s) => Cell::from_text(s),
            Data::Empty | Data::Error(_) => Cell::Absent,
            other => Cell::from_text(&other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Absent => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_absent() {
        assert_eq!(Cell::from_text(""), Cell::Absent);
        assert_eq!(Cell::from_text("   "), Cell::Absent);
        assert_eq!(Cell::from_text(" 12 "), Cell::Text(" 12 ".to_string()));
    }

    #[test]
    fn test_from_spreadsheet_data() {
        assert_eq!(Cell::from(&Data::Float(2005.0)), Cell::Number(2005.0));
        assert_eq!(Cell::from(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(Cell::from(&Data::Empty), Cell::Absent);
        assert_eq!(
            Cell::from(&Data::String("?".to_string())),
            Cell::Text("?".to_string())
        );
    }
}
