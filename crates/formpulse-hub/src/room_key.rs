use formpulse_core::config::FORM_ID_LEN;
use formpulse_core::error::{FormpulseError, Result};
use std::fmt;
use std::str::FromStr;

/// Canonical form identifier naming a room: 24 lower-case hex characters.
///
/// The only way to build one is [`RoomKey::normalize`], so every key that
/// reaches the room table is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(String);

impl RoomKey {
    /// Normalize a raw form identifier.
    ///
    /// Whitespace and path separators are removed wherever they appear
    /// (path captures sometimes arrive as `"/507f…/ "`), hex digits are
    /// lower-cased, and the result must be exactly [`FORM_ID_LEN`] hex
    /// characters.
    pub fn normalize(raw: &str) -> Result<Self> {
        let canonical: String = raw
            .chars()
            .filter(|c| !is_separator(*c))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if canonical.len() != FORM_ID_LEN || !canonical.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FormpulseError::invalid_identifier(raw));
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '/' || c == '\\'
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomKey {
    type Err = FormpulseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "507f1f77bcf86cd799439011";

    #[test]
    fn accepts_canonical_id() {
        assert_eq!(RoomKey::normalize(ID).unwrap().as_str(), ID);
    }

    #[test]
    fn strips_whitespace_and_separators() {
        for raw in [
            " 507f1f77bcf86cd799439011 ",
            "/507f1f77bcf86cd799439011/",
            "\t507f1f77bcf86cd799439011\n",
            "507f1f77 bcf86cd7/99439011",
            "\\507f1f77bcf86cd799439011",
        ] {
            assert_eq!(RoomKey::normalize(raw).unwrap().as_str(), ID, "input {raw:?}");
        }
    }

    #[test]
    fn upper_case_maps_to_same_room() {
        let upper = RoomKey::normalize("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(upper, RoomKey::normalize(ID).unwrap());
    }

    #[test]
    fn rejects_wrong_length() {
        for raw in ["", "abc", "507f1f77bcf86cd79943901", "507f1f77bcf86cd7994390111"] {
            let err = RoomKey::normalize(raw).unwrap_err();
            assert_eq!(err.code(), "INVALID_IDENTIFIER", "input {raw:?}");
        }
    }

    #[test]
    fn rejects_non_hex() {
        assert!(RoomKey::normalize("507f1f77bcf86cd79943901z").is_err());
        assert!(RoomKey::normalize("507f1f77-bcf86cd799439011").is_err());
        assert!(RoomKey::normalize("507f1f77bcf86cd7994390é").is_err());
        assert!(RoomKey::normalize("../../etc/passwd/abcdefab").is_err());
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [ID, " /507F1F77bcf86cd799439011/ ", "abc", "", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let once = RoomKey::normalize(raw);
            match once {
                Ok(key) => assert_eq!(RoomKey::normalize(key.as_str()).unwrap(), key),
                Err(_) => assert!(RoomKey::normalize(raw).is_err()),
            }
        }
    }

    #[test]
    fn parses_via_from_str() {
        let key: RoomKey = ID.parse().unwrap();
        assert_eq!(key.to_string(), ID);
    }
}
