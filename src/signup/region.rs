//! Signup regions and the storage partitions they map to.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const REGION_NAMES: &[&str] = &[
    "REGION_UNSPECIFIED",
    "REGION_USA",
    "REGION_EUR",
    "REGION_IND",
    "REGION_SGP",
];

/// Region as sent by clients.
///
/// Mirrors an open protobuf enum: numbers outside the known set are kept as
/// `Unrecognized` so validation (and the mapper) can reject them explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Region {
    #[default]
    Unspecified,
    Usa,
    Eur,
    Ind,
    Sgp,
    Unrecognized(i32),
}

impl Region {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "REGION_UNSPECIFIED" => Some(Self::Unspecified),
            "REGION_USA" => Some(Self::Usa),
            "REGION_EUR" => Some(Self::Eur),
            "REGION_IND" => Some(Self::Ind),
            "REGION_SGP" => Some(Self::Sgp),
            _ => None,
        }
    }

    #[must_use]
    pub const fn from_number(number: i32) -> Self {
        match number {
            0 => Self::Unspecified,
            1 => Self::Usa,
            2 => Self::Eur,
            3 => Self::Ind,
            4 => Self::Sgp,
            other => Self::Unrecognized(other),
        }
    }

    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Usa => 1,
            Self::Eur => 2,
            Self::Ind => 3,
            Self::Sgp => 4,
            Self::Unrecognized(other) => other,
        }
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unrecognized(number) => serializer.serialize_i32(*number),
            known => {
                let index = usize::try_from(known.number()).unwrap_or_default();
                serializer.serialize_str(REGION_NAMES.get(index).copied().unwrap_or_default())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Number(i32),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Self::from_name(&name)
                .ok_or_else(|| de::Error::unknown_variant(&name, REGION_NAMES)),
            Repr::Number(number) => Ok(Self::from_number(number)),
        }
    }
}

/// Storage partition backing a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    Usa,
    Eur,
    Ind,
    Sgp,
}

impl Partition {
    pub const ALL: [Self; 4] = [Self::Usa, Self::Eur, Self::Ind, Self::Sgp];

    /// Label of the `region` enum value the `users` table is partitioned by.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Usa => "usa",
            Self::Eur => "eur",
            Self::Ind => "ind",
            Self::Sgp => "sgp",
        }
    }

    /// Suffix embedded in handles. Always three lowercase ASCII letters.
    #[must_use]
    pub const fn code(self) -> &'static str {
        self.key()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("unexpected region: {0}")]
    Unexpected(i32),
}

/// Resolve the partition for a region, failing closed on anything unknown.
///
/// # Errors
/// Returns [`RegionError::Unexpected`] for `Unspecified` and unrecognized values.
pub const fn map(region: Region) -> Result<Partition, RegionError> {
    match region {
        Region::Usa => Ok(Partition::Usa),
        Region::Eur => Ok(Partition::Eur),
        Region::Ind => Ok(Partition::Ind),
        Region::Sgp => Ok(Partition::Sgp),
        Region::Unspecified | Region::Unrecognized(_) => {
            Err(RegionError::Unexpected(region.number()))
        }
    }
}
