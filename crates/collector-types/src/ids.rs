//! Type-safe identifier wrappers around [`String`].
//!
//! Population members and simulation runs are both identified by short
//! human-readable strings. Wrapping them in distinct newtypes keeps a
//! member id from ever being passed where a run name is expected.
//!
//! Member ids come straight from the population source and are accepted
//! as-is (after trimming). Run names also name a directory on disk, so
//! they are validated on construction through [`RunName::parse`].

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl core::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Unique, stable identifier of a population member.
    MemberId
}

define_id! {
    /// Name of a simulation run. Restricted to ASCII letters, digits,
    /// `-` and `_` because it names the run's storage directory.
    RunName
}

impl MemberId {
    /// Create a member id from any string-like value.
    ///
    /// Surrounding whitespace is trimmed; emptiness is checked by the
    /// population loader, which knows the source line to report.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_owned())
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Errors produced when validating a [`RunName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunNameError {
    /// The name was empty after trimming.
    #[error("run name must not be empty")]
    Empty,

    /// The name contained a character outside `[A-Za-z0-9_-]`.
    #[error("run name {name:?} contains invalid character {found:?}")]
    InvalidCharacter {
        /// The rejected name.
        name: String,
        /// The first offending character.
        found: char,
    },
}

impl RunName {
    /// Validate and construct a run name.
    ///
    /// # Errors
    ///
    /// Returns [`RunNameError`] if the name is empty or contains anything
    /// other than ASCII letters, digits, hyphens, and underscores.
    pub fn parse(name: &str) -> Result<Self, RunNameError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RunNameError::Empty);
        }
        if let Some(found) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(RunNameError::InvalidCharacter {
                name: trimmed.to_owned(),
                found,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn member_id_trims_whitespace() {
        let id = MemberId::new("  Pikachu ");
        assert_eq!(id.as_str(), "Pikachu");
        assert_eq!(id.to_string(), "Pikachu");
    }

    #[test]
    fn run_name_accepts_letters_digits_dash_underscore() {
        let name = RunName::parse("baseline_run-2").unwrap();
        assert_eq!(name.as_str(), "baseline_run-2");
    }

    #[test]
    fn run_name_rejects_empty() {
        assert_eq!(RunName::parse("   "), Err(RunNameError::Empty));
    }

    #[test]
    fn run_name_rejects_path_separators() {
        let err = RunName::parse("../escape").unwrap_err();
        assert_eq!(
            err,
            RunNameError::InvalidCharacter {
                name: "../escape".to_owned(),
                found: '.',
            }
        );
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = MemberId::new("Eevee");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Eevee\"");
        let back: MemberId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
