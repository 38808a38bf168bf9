//! The filterable categories of a therapist.

use std::fmt;
use std::str::FromStr;

use blossom_core::Error;
use serde::{Deserialize, Serialize};

use crate::fuzzy::rank_by_distance;

/// A single-valued categorical preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Gender,
    Languages,
    PatientAgeGroup,
    Specialisations,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Gender,
        Attribute::Languages,
        Attribute::PatientAgeGroup,
        Attribute::Specialisations,
    ];

    /// Key used in data files and category replies.
    pub fn key(self) -> &'static str {
        match self {
            Attribute::Gender => "gender",
            Attribute::Languages => "languages",
            Attribute::PatientAgeGroup => "patient_age_group",
            Attribute::Specialisations => "specialisations",
        }
    }

    /// Human wording for prompts and apologies.
    pub fn label(self) -> &'static str {
        match self {
            Attribute::Gender => "gender",
            Attribute::Languages => "language",
            Attribute::PatientAgeGroup => "patient age group",
            Attribute::Specialisations => "specialisation",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "gender" => Some(Attribute::Gender),
            "languages" => Some(Attribute::Languages),
            "patient_age_group" | "target_age_group" => Some(Attribute::PatientAgeGroup),
            "specialisations" => Some(Attribute::Specialisations),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The closed set of therapy formats a rate can be quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TherapyType {
    Individual,
    Couples,
    Family,
}

impl TherapyType {
    pub const ALL: [TherapyType; 3] = [
        TherapyType::Individual,
        TherapyType::Couples,
        TherapyType::Family,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TherapyType::Individual => "individual",
            TherapyType::Couples => "couples",
            TherapyType::Family => "family",
        }
    }
}

impl fmt::Display for TherapyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TherapyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TherapyType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidOption {
                input: s.to_string(),
                suggestions: rank_by_distance(s, TherapyType::ALL.map(TherapyType::as_str)),
            })
    }
}
