use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn from_string(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let short = self.0.get(..8).unwrap_or(&self.0);
                write!(f, "{}({})", stringify!($name), short)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(EntityId);
string_id!(StepId);
string_id!(JobSetId);

impl StepId {
    /// Id of the step that represents the snapshot as loaded.
    pub fn initial() -> Self {
        Self("initial".to_string())
    }

    pub fn is_initial(&self) -> bool {
        self.0 == "initial"
    }
}

/// Opaque optimistic-concurrency stamp handed out by the remote store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "VersionToken({short})")
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn initial_step_id() {
        assert!(StepId::initial().is_initial());
        assert!(!StepId::new().is_initial());
        assert_eq!(StepId::initial().to_string(), "initial");
    }

    #[test]
    fn debug_truncates_long_ids() {
        let id = EntityId::from("0123456789abcdef");
        assert_eq!(format!("{id:?}"), "EntityId(01234567)");
        let short = EntityId::from("m1");
        assert_eq!(format!("{short:?}"), "EntityId(m1)");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = EntityId::from("machine-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"machine-1\"");
    }
}
