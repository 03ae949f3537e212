//! Feature schema definitions.
//!
//! The ordered column lists the scaler/classifier pair was fitted on.
//! Column order is positional once a matrix is handed to the model, so
//! these tables are the single source of truth for both serving and
//! training. Any edit here invalidates every persisted artifact.

use serde::{Deserialize, Serialize};

/// Base feature names with their default values, in fitted column order.
///
/// Defaulting rule table (total over the 19 names):
/// - grade columns → 7.0
/// - binary/categorical flags (tuition, scholarship, debtor, gender,
///   displaced) → 0.0
/// - hobby ratings → 3.0
/// - everything else → 0.0
pub const BASE_FEATURES: [(&str, f64); 19] = [
    ("curricular_units_2nd_sem_(approved)", 0.0),
    ("curricular_units_2nd_sem_(grade)", 7.0),
    ("curricular_units_1st_sem_(approved)", 0.0),
    ("curricular_units_1st_sem_(grade)", 7.0),
    ("tuition_fees_up_to_date", 0.0),
    ("scholarship_holder", 0.0),
    ("age_at_enrollment", 0.0),
    ("debtor", 0.0),
    ("gender", 0.0),
    ("application_mode", 0.0),
    ("curricular_units_2nd_sem_(enrolled)", 0.0),
    ("curricular_units_1st_sem_(enrolled)", 0.0),
    ("displaced", 0.0),
    ("hobbies_sports", 3.0),
    ("hobbies_arts", 3.0),
    ("hobbies_reading", 3.0),
    ("hobbies_social", 3.0),
    ("hobbies_gaming", 3.0),
    ("hobbies_volunteering", 3.0),
];

/// Engineered columns appended by the extended variant, in fitted order.
/// These are always recomputed from base values, never read from a raw
/// record, so they cannot drift from the base columns they derive from.
/// total_enrolled is an intermediate of approval_rate only, not a column.
pub const DERIVED_FEATURES: [&str; 4] =
    ["total_approved", "approval_rate", "avg_grade", "grade_trend"];

// Positions of the base columns the derived features are computed from.
// `indices_match_names` below pins these against BASE_FEATURES.
pub(crate) const IDX_APPROVED_2ND: usize = 0;
pub(crate) const IDX_GRADE_2ND: usize = 1;
pub(crate) const IDX_APPROVED_1ST: usize = 2;
pub(crate) const IDX_GRADE_1ST: usize = 3;
pub(crate) const IDX_ENROLLED_2ND: usize = 10;
pub(crate) const IDX_ENROLLED_1ST: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// The original 19-feature set the first-generation model was fit on.
    Base,
    /// Base plus the 4 engineered ratio/trend features (23 columns).
    Extended,
}

impl SchemaVariant {
    /// Declared matrix width for this variant.
    pub fn width(&self) -> usize {
        match self {
            SchemaVariant::Base => BASE_FEATURES.len(),
            SchemaVariant::Extended => BASE_FEATURES.len() + DERIVED_FEATURES.len(),
        }
    }

    /// Exact ordered column list the downstream model expects.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> =
            BASE_FEATURES.iter().map(|(name, _)| *name).collect();
        if let SchemaVariant::Extended = self {
            columns.extend(DERIVED_FEATURES);
        }
        columns
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVariant::Base => "base",
            SchemaVariant::Extended => "extended",
        }
    }
}

/// Default value for a base feature, or None for names outside the base
/// set (derived features are not defaultable by design).
pub fn default_for(name: &str) -> Option<f64> {
    BASE_FEATURES
        .iter()
        .find(|(feature, _)| *feature == name)
        .map(|(_, default)| *default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_widths() {
        assert_eq!(SchemaVariant::Base.width(), 19);
        assert_eq!(SchemaVariant::Extended.width(), 23);
        assert_eq!(SchemaVariant::Base.columns().len(), 19);
        assert_eq!(SchemaVariant::Extended.columns().len(), 23);
    }

    #[test]
    fn extended_appends_derived_in_order() {
        let columns = SchemaVariant::Extended.columns();
        assert_eq!(&columns[..19], &SchemaVariant::Base.columns()[..]);
        assert_eq!(&columns[19..], &DERIVED_FEATURES);
    }

    #[test]
    fn defaults_follow_rule_table() {
        for (name, default) in BASE_FEATURES {
            let expected = if name.contains("grade") {
                7.0
            } else if [
                "tuition_fees_up_to_date",
                "scholarship_holder",
                "debtor",
                "gender",
                "displaced",
            ]
            .contains(&name)
            {
                0.0
            } else if name.contains("hobbies") {
                3.0
            } else {
                0.0
            };
            assert_eq!(default, expected, "default for {}", name);
            assert_eq!(default_for(name), Some(expected));
        }
    }

    #[test]
    fn derived_features_are_not_defaultable() {
        for name in DERIVED_FEATURES {
            assert_eq!(default_for(name), None);
        }
    }

    #[test]
    fn indices_match_names() {
        assert_eq!(
            BASE_FEATURES[IDX_APPROVED_2ND].0,
            "curricular_units_2nd_sem_(approved)"
        );
        assert_eq!(
            BASE_FEATURES[IDX_GRADE_2ND].0,
            "curricular_units_2nd_sem_(grade)"
        );
        assert_eq!(
            BASE_FEATURES[IDX_APPROVED_1ST].0,
            "curricular_units_1st_sem_(approved)"
        );
        assert_eq!(
            BASE_FEATURES[IDX_GRADE_1ST].0,
            "curricular_units_1st_sem_(grade)"
        );
        assert_eq!(
            BASE_FEATURES[IDX_ENROLLED_2ND].0,
            "curricular_units_2nd_sem_(enrolled)"
        );
        assert_eq!(
            BASE_FEATURES[IDX_ENROLLED_1ST].0,
            "curricular_units_1st_sem_(enrolled)"
        );
    }
}
