//! Roles and country assignments
//!
//! Roles are a closed tagged enumeration. Country-scoped users carry their
//! country inside the variant instead of a `country_user_*` string, so the
//! authorization engine can match exhaustively.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Country assignment for files and country-scoped users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Country {
    Uk,
    De,
    It,
    Fr,
    Es,
}

impl Country {
    /// All selectable countries, in display order
    pub const ALL: [Country; 5] = [
        Country::Uk,
        Country::De,
        Country::It,
        Country::Fr,
        Country::Es,
    ];

    /// Two-letter uppercase code
    pub fn code(&self) -> &'static str {
        match self {
            Country::Uk => "UK",
            Country::De => "DE",
            Country::It => "IT",
            Country::Fr => "FR",
            Country::Es => "ES",
        }
    }

    /// Parse a country code, case-insensitively
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "UK" => Some(Country::Uk),
            "DE" => Some(Country::De),
            "IT" => Some(Country::It),
            "FR" => Some(Country::Fr),
            "ES" => Some(Country::Es),
            _ => None,
        }
    }

    /// Lowercase role suffix (`uk` in `country_user_uk`)
    pub fn role_suffix(&self) -> &'static str {
        match self {
            Country::Uk => "uk",
            Country::De => "de",
            Country::It => "it",
            Country::Fr => "fr",
            Country::Es => "es",
        }
    }
}

impl Default for Country {
    fn default() -> Self {
        Country::Uk
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::from_code(s).ok_or_else(|| CoreError::InvalidCountry(s.to_string()))
    }
}

impl Serialize for Country {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Country {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Country::from_code(&s).ok_or_else(|| de::Error::custom(format!("unknown country: {s}")))
    }
}

/// Actor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// External reporter; uploads are urgency/stage locked for everyone
    User,
    /// Editorial staff
    Admin,
    /// Full administration, including user management
    Super,
    /// Reporter scoped to a single country's files
    CountryUser(Country),
}

impl Role {
    /// Canonical role string (`user`, `admin`, `super`, `country_user_uk`, ...)
    pub fn as_role_str(&self) -> String {
        match self {
            Role::User => "user".to_string(),
            Role::Admin => "admin".to_string(),
            Role::Super => "super".to_string(),
            Role::CountryUser(c) => format!("country_user_{}", c.role_suffix()),
        }
    }

    /// Parse a canonical role string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super" => Some(Role::Super),
            other => {
                let suffix = other.strip_prefix("country_user_")?;
                Country::from_code(suffix).map(Role::CountryUser)
            }
        }
    }

    /// Bound country for country-scoped users
    pub fn country(&self) -> Option<Country> {
        match self {
            Role::CountryUser(c) => Some(*c),
            _ => None,
        }
    }

    /// Admin or super
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Super)
    }

    pub fn is_super(&self) -> bool {
        matches!(self, Role::Super)
    }

    pub fn is_country_user(&self) -> bool {
        matches!(self, Role::CountryUser(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_role_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| CoreError::InvalidRole(s.to_string()))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_role_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Role::parse(&s).ok_or_else(|| de::Error::custom(format!("unknown role: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_round_trip() {
        for c in Country::ALL {
            assert_eq!(Country::from_code(c.code()), Some(c));
        }
        assert_eq!(Country::from_code("de"), Some(Country::De));
        assert_eq!(Country::from_code("XX"), None);
    }

    #[test]
    fn test_role_round_trip() {
        let roles = [
            Role::User,
            Role::Admin,
            Role::Super,
            Role::CountryUser(Country::It),
        ];
        for r in roles {
            assert_eq!(Role::parse(&r.as_role_str()), Some(r));
        }
        assert_eq!(
            Role::parse("country_user_fr"),
            Some(Role::CountryUser(Country::Fr))
        );
        assert_eq!(Role::parse("country_user_zz"), None);
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_role_serde_as_string() {
        let json = serde_json::to_string(&Role::CountryUser(Country::Uk)).unwrap();
        assert_eq!(json, "\"country_user_uk\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::CountryUser(Country::Uk));
    }
}
