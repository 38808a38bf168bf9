//! The therapist directory and the preference filtering engine.
//!
//! A [`TherapistDirectory`] is loaded once from `therapists.json` and
//! builds its [`AttributeIndex`] at load time. Each customer session gets
//! its own [`PreferenceStore`] over a shared directory.

pub mod attribute;
pub mod directory;
pub mod fuzzy;
pub mod index;
pub mod preferences;

pub use attribute::{Attribute, TherapyType};
pub use directory::{TherapistDirectory, TherapistRecord};
pub use fuzzy::{closest, levenshtein, rank_by_distance};
pub use index::AttributeIndex;
pub use preferences::{PRICE_CEILING, PreferenceStore, PriceFilter};
