//! Attribute Index — inverted maps from attribute value to therapists.
//!
//! Built once per directory load. Null or absent attributes never reach
//! the index: a therapist with no gender is in no gender set, a `false`
//! age group is skipped, a day with no hours or a rate with no price is
//! left out.

use std::collections::{BTreeMap, BTreeSet};

use crate::attribute::Attribute;
use crate::directory::TherapistRecord;

#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    categorical: BTreeMap<Attribute, BTreeMap<String, BTreeSet<String>>>,
    /// Day → therapist → `[start, end]`.
    availability: BTreeMap<String, BTreeMap<String, [String; 2]>>,
    /// Therapy type → therapist → band → price.
    rates: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl AttributeIndex {
    pub fn build(records: &BTreeMap<String, TherapistRecord>) -> Self {
        let mut index = Self::default();

        for (name, record) in records {
            if let Some(gender) = &record.gender {
                index.insert(Attribute::Gender, gender, name);
            }
            for language in &record.languages {
                index.insert(Attribute::Languages, language, name);
            }
            for (group, serves) in &record.patient_age_group {
                if *serves {
                    index.insert(Attribute::PatientAgeGroup, group, name);
                }
            }
            for specialisation in &record.specialisations {
                index.insert(Attribute::Specialisations, specialisation, name);
            }

            for (day, hours) in &record.availability {
                if let Some(hours) = hours {
                    index
                        .availability
                        .entry(day.clone())
                        .or_default()
                        .insert(name.clone(), hours.clone());
                }
            }

            for (therapy_type, bands) in &record.rates {
                let priced: BTreeMap<String, f64> = bands
                    .iter()
                    .filter_map(|(band, price)| price.map(|p| (band.clone(), p)))
                    .collect();
                if !priced.is_empty() {
                    index
                        .rates
                        .entry(therapy_type.clone())
                        .or_default()
                        .insert(name.clone(), priced);
                }
            }
        }

        index
    }

    fn insert(&mut self, attribute: Attribute, value: &str, name: &str) {
        self.categorical
            .entry(attribute)
            .or_default()
            .entry(value.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Therapists holding `value` for `attribute`.
    pub fn lookup(&self, attribute: Attribute, value: &str) -> Option<&BTreeSet<String>> {
        self.categorical.get(&attribute)?.get(value)
    }

    /// Every known value of `attribute`, sorted.
    pub fn options(&self, attribute: Attribute) -> Vec<String> {
        self.categorical
            .get(&attribute)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Therapists with at least one non-null rate for `therapy_type` in
    /// `[lower, upper]` inclusive.
    pub fn priced_within(&self, therapy_type: &str, lower: f64, upper: f64) -> BTreeSet<String> {
        self.rates
            .get(therapy_type)
            .map(|therapists| {
                therapists
                    .iter()
                    .filter(|(_, bands)| bands.values().any(|p| (lower..=upper).contains(p)))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Therapists working on `day`, with their hours.
    pub fn available_on(&self, day: &str) -> Option<&BTreeMap<String, [String; 2]>> {
        self.availability.get(day)
    }
}
