//! Preference Store — one customer's filter state over the directory.
//!
//! The candidate list is always the intersection of every therapist, one
//! attribute-index set per active categorical preference, and the
//! price-eligible set when a price preference is active.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use blossom_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::attribute::{Attribute, TherapyType};
use crate::directory::TherapistDirectory;
use crate::fuzzy::rank_by_distance;

/// Upper bound used when the customer gives no maximum price.
pub const PRICE_CEILING: f64 = 1_000_000.0;

/// An active price preference and the therapists it admits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFilter {
    pub therapy_type: TherapyType,
    pub lower_bound: f64,
    pub upper_bound: f64,
    #[serde(skip)]
    eligible: BTreeSet<String>,
}

impl PriceFilter {
    pub fn eligible(&self) -> &BTreeSet<String> {
        &self.eligible
    }
}

pub struct PreferenceStore {
    directory: Arc<TherapistDirectory>,
    selected: BTreeMap<Attribute, String>,
    price: Option<PriceFilter>,
}

impl PreferenceStore {
    pub fn new(directory: Arc<TherapistDirectory>) -> Self {
        Self {
            directory,
            selected: BTreeMap::new(),
            price: None,
        }
    }

    pub fn directory(&self) -> &TherapistDirectory {
        &self.directory
    }

    /// Therapists matching every active preference, sorted by name.
    pub fn candidate_providers(&self) -> Vec<String> {
        let index = self.directory.index();
        let empty = BTreeSet::new();

        self.directory
            .names()
            .filter(|name| {
                self.selected.iter().all(|(attribute, value)| {
                    index
                        .lookup(*attribute, value)
                        .unwrap_or(&empty)
                        .contains(*name)
                })
            })
            .filter(|name| {
                self.price
                    .as_ref()
                    .is_none_or(|price| price.eligible.contains(*name))
            })
            .map(String::from)
            .collect()
    }

    /// Every known value of `attribute`, sorted.
    pub fn options(&self, attribute: Attribute) -> Vec<String> {
        self.directory.index().options(attribute)
    }

    pub fn selected(&self, attribute: Attribute) -> Option<&str> {
        self.selected.get(&attribute).map(|s| s.as_str())
    }

    pub fn price(&self) -> Option<&PriceFilter> {
        self.price.as_ref()
    }

    /// Whether any preference is active.
    pub fn is_filtering(&self) -> bool {
        !self.selected.is_empty() || self.price.is_some()
    }

    /// Set or clear (`None`) one categorical preference.
    ///
    /// A value outside the attribute's known options fails with
    /// [`Error::InvalidOption`] carrying every option, closest first.
    /// Matching ignores case; the stored value is the directory's spelling.
    pub fn update(&mut self, attribute: Attribute, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            if self.selected.remove(&attribute).is_some() {
                debug!(%attribute, "Preference cleared");
            }
            return Ok(());
        };

        let options = self.options(attribute);
        let value = value.trim();
        let canonical = options
            .iter()
            .find(|o| o.as_str() == value)
            .or_else(|| options.iter().find(|o| o.eq_ignore_ascii_case(value)));

        match canonical {
            Some(option) => {
                debug!(%attribute, value = %option, "Preference set");
                self.selected.insert(attribute, option.clone());
                Ok(())
            }
            None => {
                warn!(%attribute, value, "Unknown preference value");
                Err(Error::InvalidOption {
                    input: value.to_string(),
                    suggestions: rank_by_distance(value, options),
                })
            }
        }
    }

    pub fn update_gender(&mut self, value: Option<&str>) -> Result<()> {
        self.update(Attribute::Gender, value)
    }

    pub fn update_languages(&mut self, value: Option<&str>) -> Result<()> {
        self.update(Attribute::Languages, value)
    }

    pub fn update_patient_age_group(&mut self, value: Option<&str>) -> Result<()> {
        self.update(Attribute::PatientAgeGroup, value)
    }

    pub fn update_specialisations(&mut self, value: Option<&str>) -> Result<()> {
        self.update(Attribute::Specialisations, value)
    }

    /// Set the price preference and recompute the eligible set.
    ///
    /// Missing bounds default to `0` and [`PRICE_CEILING`]. A therapist
    /// qualifies if any of their rates for the therapy type falls in the
    /// inclusive range.
    pub fn update_price(
        &mut self,
        upper_bound: Option<f64>,
        lower_bound: Option<f64>,
        therapy_type: &str,
    ) -> Result<()> {
        let therapy_type: TherapyType = therapy_type.parse()?;
        let lower_bound = lower_bound.unwrap_or(0.0);
        let upper_bound = upper_bound.unwrap_or(PRICE_CEILING);

        let eligible =
            self.directory
                .index()
                .priced_within(therapy_type.as_str(), lower_bound, upper_bound);

        debug!(
            %therapy_type,
            lower_bound,
            upper_bound,
            eligible = eligible.len(),
            "Price preference set"
        );

        self.price = Some(PriceFilter {
            therapy_type,
            lower_bound,
            upper_bound,
            eligible,
        });
        Ok(())
    }

    pub fn clear_price(&mut self) {
        if self.price.take().is_some() {
            debug!("Price preference cleared");
        }
    }

    /// Drop every preference.
    pub fn reset(&mut self) {
        self.selected.clear();
        self.price = None;
    }
}
