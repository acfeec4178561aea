use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Text layout used when a timestamp is bound to a backend without a native type.
pub const TIMESTAMP_FORMAT: &str = "%F %T%.f";

/// A bound parameter or a value read back from a row.
///
/// ```rust
/// use lazy_tx::prelude::*;
///
/// let params = [RowValues::Int(1), RowValues::Text("alice".into())];
/// assert_eq!(params[0].as_int(), Some(&1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    Int(i64),
    Float(f64),
    Text(String),
    /// Stored as 0/1 by `SQLite`.
    Bool(bool),
    /// Stored as [`TIMESTAMP_FORMAT`] text by `SQLite`.
    Timestamp(NaiveDateTime),
    Null,
    /// Stored as serialized JSON text by `SQLite`.
    JSON(JsonValue),
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// A timestamp, either native or as text written in [`TIMESTAMP_FORMAT`].
    ///
    /// Backends without a timestamp type hand the text form back on reads.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(text) => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn timestamps_are_read_from_text() {
        let ts = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_milli_opt(12, 30, 0, 250)
            .unwrap();
        let text = RowValues::Text(ts.format(TIMESTAMP_FORMAT).to_string());
        assert_eq!(text.as_timestamp(), Some(ts));
        assert_eq!(RowValues::Timestamp(ts).as_timestamp(), Some(ts));
        assert_eq!(RowValues::Text("yesterday".into()).as_timestamp(), None);
        assert_eq!(RowValues::Int(0).as_timestamp(), None);
    }
}
