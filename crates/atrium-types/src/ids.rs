use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must be a positive integer, got '{value}'")]
pub struct IdError {
    pub kind: &'static str,
    pub value: String,
}

/// Storage identifiers are positive integers. Anything else is rejected at
/// the edge so handlers never see a zero or negative id.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Result<Self, IdError> {
                if raw > 0 {
                    Ok(Self(raw))
                } else {
                    Err(IdError {
                        kind: $kind,
                        value: raw.to_string(),
                    })
                }
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw: i64 = s.trim().parse().map_err(|_| IdError {
                    kind: $kind,
                    value: s.to_string(),
                })?;
                Self::new(raw)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = i64::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_id!(
    /// Identifier of a registered user.
    UserId,
    "user_id"
);

define_id!(
    /// Identifier of a chat room.
    RoomId,
    "room_id"
);

define_id!(
    /// Identifier assigned to a message by storage.
    MessageId,
    "message_id"
);
