//! The canonical physical stock locations.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One of the five canonical location buckets stock is tracked against.
///
/// The set is closed in the source system; anything that is not one of the
/// four named yards is booked under `Other`. Wire names match the backend's
/// display strings exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "Times Square")]
    TimesSquare,
    #[serde(rename = "iSquare")]
    ISquare,
    #[serde(rename = "Sakar")]
    Sakar,
    #[serde(rename = "Pirana")]
    Pirana,
    #[serde(rename = "Other")]
    Other,
}

impl Location {
    /// All buckets, in canonical display order.
    pub const ALL: [Location; 5] = [
        Location::TimesSquare,
        Location::ISquare,
        Location::Sakar,
        Location::Pirana,
        Location::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::TimesSquare => "Times Square",
            Location::ISquare => "iSquare",
            Location::Sakar => "Sakar",
            Location::Pirana => "Pirana",
            Location::Other => "Other",
        }
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Times Square" => Ok(Location::TimesSquare),
            "iSquare" => Ok(Location::ISquare),
            "Sakar" => Ok(Location::Sakar),
            "Pirana" => Ok(Location::Pirana),
            "Other" => Ok(Location::Other),
            other => Err(DomainError::validation(format!(
                "unknown location '{other}'; expected one of: Times Square, iSquare, Sakar, Pirana, Other"
            ))),
        }
    }
}
