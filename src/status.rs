//! IP status - the closed lifecycle enumeration
//!
//! Every IP is in exactly one of four states:
//! - `Alpha`: early development
//! - `Beta`: feature complete, under validation
//! - `Production`: released for use
//! - `Obsolete`: superseded, kept for reference
//!
//! Transitions between states are unconstrained; `release` always targets
//! `Production`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpStatus {
    #[default]
    Alpha,
    Beta,
    Production,
    Obsolete,
}

impl IpStatus {
    /// Get the string representation stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            IpStatus::Alpha => "alpha",
            IpStatus::Beta => "beta",
            IpStatus::Production => "production",
            IpStatus::Obsolete => "obsolete",
        }
    }

    /// Get all statuses
    pub fn all() -> &'static [IpStatus] {
        &[
            IpStatus::Alpha,
            IpStatus::Beta,
            IpStatus::Production,
            IpStatus::Obsolete,
        ]
    }

    pub fn is_released(&self) -> bool {
        matches!(self, IpStatus::Production)
    }
}

impl FromStr for IpStatus {
    type Err = Error;

    /// Parsing is exact: stored values are lowercase and nothing else is accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alpha" => Ok(IpStatus::Alpha),
            "beta" => Ok(IpStatus::Beta),
            "production" => Ok(IpStatus::Production),
            "obsolete" => Ok(IpStatus::Obsolete),
            _ => {
                let allowed: Vec<&str> = IpStatus::all().iter().map(|s| s.as_str()).collect();
                Err(Error::Validation(format!(
                    "invalid status '{}', must be one of: {}",
                    s,
                    allowed.join(", ")
                )))
            }
        }
    }
}

impl std::fmt::Display for IpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
