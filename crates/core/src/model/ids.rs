use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when an identifier is empty or blank.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} must not be empty")]
pub struct IdError {
    kind: &'static str,
}

impl IdError {
    /// Name of the identifier type that failed validation.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

// Identifiers come from the remote data platform as opaque strings, so every
// id is a trimmed, non-empty string newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from a non-blank string.")]
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the value is empty after trimming.
            pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(IdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a timetable slot owned by the scheduling subsystem.
    PlannedSessionId
);
string_id!(
    /// Identifier of the durable record of one attempt at a planned session.
    RevisionSessionId
);
string_id!(
    /// Identifier of a learner.
    LearnerId
);
string_id!(
    /// Identifier of a curriculum subject.
    SubjectId
);
string_id!(
    /// Identifier of a curriculum topic.
    TopicId
);
string_id!(
    /// Server-assigned identifier of a generated mnemonic.
    MnemonicId
);
string_id!(
    /// Durable tracking identity of a mnemonic generation request.
    MnemonicRequestId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_trims_and_displays() {
        let id = PlannedSessionId::new("  ps-42 ").unwrap();
        assert_eq!(id.as_str(), "ps-42");
        assert_eq!(id.to_string(), "ps-42");
        assert_eq!(format!("{id:?}"), "PlannedSessionId(ps-42)");
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = RevisionSessionId::new("   ").unwrap_err();
        assert_eq!(err.kind(), "RevisionSessionId");
        assert!("".parse::<LearnerId>().is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(MnemonicRequestId::generate(), MnemonicRequestId::generate());
    }

    #[test]
    fn deserializing_blank_id_fails() {
        let ok: TopicId = serde_json::from_str("\"topic-1\"").unwrap();
        assert_eq!(ok.as_str(), "topic-1");
        assert!(serde_json::from_str::<TopicId>("\"\"").is_err());
    }
}
