//! Validated text values.

use crate::{EgfrError, EgfrResult};

/// Trimmed text with at least one non-whitespace character.
///
/// Used for account identifiers (NHS number, HCP ID) and names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and rejects it if nothing is left.
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::InvalidInput`] naming `what` when the trimmed input is empty.
    pub fn parse(input: impl AsRef<str>, what: &str) -> EgfrResult<Self> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EgfrError::InvalidInput(format!("{what} cannot be empty")));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::parse(&s, "text").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let text = NonEmptyText::parse("  943 476 5919 ", "identifier").unwrap();
        assert_eq!(text.as_str(), "943 476 5919");
    }

    #[test]
    fn test_parse_rejects_blank() {
        match NonEmptyText::parse(" \t", "identifier") {
            Err(EgfrError::InvalidInput(msg)) => assert_eq!(msg, "identifier cannot be empty"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }
}
