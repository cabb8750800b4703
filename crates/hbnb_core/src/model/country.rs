//! Country entity.
//!
//! # Invariants
//! - `code` is an upper-case ISO 3166-1 alpha-2 code.
//! - Code uniqueness is enforced by the data manager, not here.

use serde::{Deserialize, Serialize};

use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::Identity;
use crate::model::validation::{require_text, ValidationError};

/// ISO 3166-1 alpha-2 codes accepted for countries, sorted for binary search.
const ISO_ALPHA2_CODES: [&str; 249] = [
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX", "AZ",
    "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ", "BR", "BS",
    "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK", "CL", "CM", "CN",
    "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM", "DO", "DZ", "EC", "EE",
    "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF",
    "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM",
    "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IR", "IS", "IT", "JE", "JM",
    "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC",
    "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK",
    "ML", "MM", "MN", "MO", "MP", "MQ", "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA",
    "NC", "NE", "NF", "NG", "NI", "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG",
    "PH", "PK", "PL", "PM", "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW",
    "SA", "SB", "SC", "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS",
    "ST", "SV", "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO",
    "TR", "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    code: String,
}

impl Country {
    /// Creates a country after validating name and ISO code.
    ///
    /// The code is trimmed and upper-cased before the lookup.
    pub fn new(name: impl Into<String>, code: impl AsRef<str>) -> Result<Self, ValidationError> {
        Ok(Self {
            identity: Identity::new(),
            name: require_text("name", name.into())?,
            code: normalize_country_code(code.as_ref())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Renames the country. The code is fixed for the country lifetime.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = require_text("name", name.into())?;
        self.identity.touch();
        Ok(())
    }
}

impl Entity for Country {
    const KIND: EntityKind = EntityKind::Country;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        require_text("name", self.name.clone())?;
        if normalize_country_code(&self.code)? != self.code {
            return Err(ValidationError::InvalidCountryCode(self.code.clone()));
        }
        Ok(())
    }
}

/// Normalizes a candidate code to upper case and checks it against the ISO table.
pub fn normalize_country_code(code: &str) -> Result<String, ValidationError> {
    let normalized = code.trim().to_ascii_uppercase();
    let well_formed =
        normalized.len() == 2 && normalized.bytes().all(|byte| byte.is_ascii_uppercase());
    if !well_formed || ISO_ALPHA2_CODES.binary_search(&normalized.as_str()).is_err() {
        return Err(ValidationError::InvalidCountryCode(code.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{normalize_country_code, ISO_ALPHA2_CODES};

    #[test]
    fn iso_table_is_sorted_and_unique() {
        assert!(ISO_ALPHA2_CODES.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn normalize_accepts_lower_case() {
        assert_eq!(normalize_country_code(" us ").unwrap(), "US");
    }

    #[test]
    fn normalize_rejects_unknown_and_malformed_codes() {
        assert!(normalize_country_code("XX").is_err());
        assert!(normalize_country_code("USA").is_err());
        assert!(normalize_country_code("1A").is_err());
        assert!(normalize_country_code("").is_err());
    }
}
