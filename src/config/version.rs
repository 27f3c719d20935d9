//! Admin API version selection.
//!
//! The webhook REST endpoints are versioned (`/admin/api/{version}/...`).
//! [`ApiVersion`] names the quarterly releases this crate has been run
//! against and accepts any other well-formed `YYYY-MM` string.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Shopify Admin API version.
///
/// ```rust
/// use shopify_server::ApiVersion;
///
/// let version: ApiVersion = "2025-07".parse().unwrap();
/// assert_eq!(version, ApiVersion::V2025_07);
/// assert_eq!(ApiVersion::latest().to_string(), "2025-10");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// API version 2025-01.
    V2025_01,
    /// API version 2025-04.
    V2025_04,
    /// API version 2025-07.
    V2025_07,
    /// API version 2025-10.
    V2025_10,
    /// The moving `unstable` version.
    Unstable,
    /// Any other `YYYY-MM` release.
    Custom(String),
}

impl ApiVersion {
    /// Returns the latest stable API version.
    #[must_use]
    pub const fn latest() -> Self {
        Self::V2025_10
    }

    /// Returns `true` for the named quarterly releases.
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        !matches!(self, Self::Unstable | Self::Custom(_))
    }

    fn is_valid_version_format(s: &str) -> bool {
        let Some((year, month)) = s.split_once('-') else {
            return false;
        };
        if year.len() != 4 || month.len() != 2 {
            return false;
        }
        if !year.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        matches!(month.parse::<u8>(), Ok(1..=12))
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version_str = match self {
            Self::V2025_01 => "2025-01",
            Self::V2025_04 => "2025-04",
            Self::V2025_07 => "2025-07",
            Self::V2025_10 => "2025-10",
            Self::Unstable => "unstable",
            Self::Custom(v) => v,
        };
        f.write_str(version_str)
    }
}

impl FromStr for ApiVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "2025-01" => Ok(Self::V2025_01),
            "2025-04" => Ok(Self::V2025_04),
            "2025-07" => Ok(Self::V2025_07),
            "2025-10" => Ok(Self::V2025_10),
            "unstable" => Ok(Self::Unstable),
            _ if Self::is_valid_version_format(&s) => Ok(Self::Custom(s)),
            _ => Err(ConfigError::InvalidApiVersion { version: s }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_versions_round_trip_through_display() {
        for v in [
            ApiVersion::V2025_01,
            ApiVersion::V2025_04,
            ApiVersion::V2025_07,
            ApiVersion::V2025_10,
            ApiVersion::Unstable,
        ] {
            assert_eq!(v.to_string().parse::<ApiVersion>().unwrap(), v);
        }
    }

    #[test]
    fn test_future_version_is_custom() {
        let v: ApiVersion = "2026-04".parse().unwrap();
        assert_eq!(v, ApiVersion::Custom("2026-04".to_string()));
        assert!(!v.is_stable());
    }

    #[test]
    fn test_malformed_versions_are_rejected() {
        for bad in ["2025-13", "25-01", "2025/01", "latest", ""] {
            assert!(
                matches!(bad.parse::<ApiVersion>(), Err(ConfigError::InvalidApiVersion { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
