//! Feature matrix construction.
//!
//! Turns raw student records into the fixed-width numeric matrix the
//! scaler/classifier pair expects: defaulting for absent base features,
//! lenient numeric coercion, derived-feature computation for the extended
//! variant, and a defensive width check against schema drift.

use ndarray::Array2;
use serde_json::Value;
use tracing::debug;

use super::schema::{
    self, SchemaVariant, BASE_FEATURES, IDX_APPROVED_1ST, IDX_APPROVED_2ND, IDX_ENROLLED_1ST,
    IDX_ENROLLED_2ND, IDX_GRADE_1ST, IDX_GRADE_2ND,
};
use crate::error::{PredictionError, Result};
use crate::models::RawRecord;

/// Build one feature row per record, in input order.
///
/// Pure function of the records and the schema tables: identical input
/// yields bit-identical output. A value that cannot be read as a number is
/// coerced to 0.0 rather than failing the batch; a missing base feature
/// takes its schema default. Extra caller-supplied keys are discarded,
/// including any attempt to supply a derived feature directly.
pub fn build(records: &[RawRecord], variant: SchemaVariant) -> Result<Array2<f64>> {
    let width = variant.width();
    let mut data = Vec::with_capacity(records.len() * width);

    for record in records {
        let mut row = materialize_base(record);
        if let SchemaVariant::Extended = variant {
            row.extend(derived_features(&row));
        }

        // Unreachable given the steps above; guards schema/code drift.
        if row.len() != width {
            return Err(PredictionError::SchemaMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        data.extend(row);
    }

    let total = data.len();
    Array2::from_shape_vec((records.len(), width), data).map_err(|_| {
        PredictionError::SchemaMismatch {
            expected: records.len() * width,
            actual: total,
        }
    })
}

/// Materialize every base column: caller value if present, else default.
fn materialize_base(record: &RawRecord) -> Vec<f64> {
    BASE_FEATURES
        .iter()
        .map(|(name, default)| match record.get(*name) {
            Some(value) => coerce(name, value),
            None => *default,
        })
        .collect()
}

/// Engineered columns, computed strictly from the already-coerced base
/// row so they are always internally consistent with it. Order matches
/// [`schema::DERIVED_FEATURES`].
fn derived_features(base: &[f64]) -> Vec<f64> {
    let total_approved = base[IDX_APPROVED_1ST] + base[IDX_APPROVED_2ND];
    let total_enrolled = base[IDX_ENROLLED_1ST] + base[IDX_ENROLLED_2ND];
    let approval_rate = if total_enrolled > 0.0 {
        total_approved / total_enrolled
    } else {
        0.0
    };
    let avg_grade = (base[IDX_GRADE_1ST] + base[IDX_GRADE_2ND]) / 2.0;
    let grade_trend = base[IDX_GRADE_2ND] - base[IDX_GRADE_1ST];

    debug_assert_eq!(schema::DERIVED_FEATURES.len(), 4);
    vec![total_approved, approval_rate, avg_grade, grade_trend]
}

/// Lenient numeric coercion: numbers pass through, numeric strings are
/// parsed, booleans map to 0/1, anything else becomes 0.0.
fn coerce(name: &str, value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => parsed,
            _ => {
                debug!(feature = name, value = %s, "Unparseable field value, coerced to 0.0");
                0.0
            }
        },
        _ => {
            debug!(feature = name, "Non-scalar field value, coerced to 0.0");
            0.0
        }
    }
}
