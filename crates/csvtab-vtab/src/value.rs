/// A value handed across the virtual table boundary.
///
/// Corresponds to C SQLite's `sqlite3_value`, restricted to the storage
/// classes a CSV table produces. Text is kept as the raw bytes the table
/// returned, the way `sqlite3_result_text` stores them: nothing here
/// requires or repairs UTF-8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqliteValue {
    /// SQL NULL.
    Null,
    /// A text value, byte for byte.
    Text(Vec<u8>),
}

impl SqliteValue {
    /// Returns true if this is a NULL value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The raw bytes of a text value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(bytes) => Some(bytes),
            Self::Null => None,
        }
    }

    /// The text value, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

impl From<&str> for SqliteValue {
    fn from(s: &str) -> Self {
        Self::Text(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for SqliteValue {
    fn from(bytes: &[u8]) -> Self {
        Self::Text(bytes.to_vec())
    }
}

impl From<Vec<u8>> for SqliteValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Text(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keeps_invalid_utf8() {
        let v = SqliteValue::from(&b"caf\xe9"[..]);
        assert_eq!(v.as_bytes(), Some(&b"caf\xe9"[..]));
        assert_eq!(v.as_str(), None);
    }

    #[test]
    fn null_and_str_accessors() {
        assert!(SqliteValue::Null.is_null());
        assert_eq!(SqliteValue::Null.as_bytes(), None);
        assert_eq!(SqliteValue::from("t").as_str(), Some("t"));
        assert!(!SqliteValue::from("").is_null());
    }
}
