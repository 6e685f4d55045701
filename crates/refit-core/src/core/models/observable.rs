use nalgebra::DVector;
use serde::Deserialize;

use super::DataError;

/// How an experimental data point constrains the ensemble average.
///
/// Equality constraints always contribute a residual. Bound constraints are
/// one-sided: they contribute only when the predicted average violates the
/// bound, and are silent otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    Equality,
    /// The experimental value is a lower bound on the predicted average.
    Lower,
    /// The experimental value is an upper bound on the predicted average.
    Upper,
}

impl BoundKind {
    /// Whether a signed deviation `predicted - experimental` is penalized.
    pub fn penalizes(&self, deviation: f64) -> bool {
        match self {
            BoundKind::Equality => true,
            BoundKind::Lower => deviation < 0.0,
            BoundKind::Upper => deviation > 0.0,
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, DataError> {
        match tag {
            "equality" | "=" => Ok(BoundKind::Equality),
            "lower" | ">" => Ok(BoundKind::Lower),
            "upper" | "<" => Ok(BoundKind::Upper),
            _ => Err(DataError::UnknownBoundKind {
                tag: tag.to_string(),
            }),
        }
    }
}

/// A named set of experimental data points of one physical type.
///
/// The predicted counterpart is a frames-by-observables table held by the
/// owning [`super::system::System`]; `values` and `uncertainties` run over the
/// observable axis of that table.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableGroup {
    pub values: DVector<f64>,
    pub uncertainties: DVector<f64>,
    pub bound: BoundKind,
}

impl ObservableGroup {
    pub fn new(values: DVector<f64>, uncertainties: DVector<f64>, bound: BoundKind) -> Self {
        Self {
            values,
            uncertainties,
            bound,
        }
    }

    /// Number of scalar observables in the group.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_penalizes_both_directions() {
        assert!(BoundKind::Equality.penalizes(0.5));
        assert!(BoundKind::Equality.penalizes(-0.5));
        assert!(BoundKind::Equality.penalizes(0.0));
    }

    #[test]
    fn upper_bound_penalizes_only_excess() {
        assert!(BoundKind::Upper.penalizes(0.3));
        assert!(!BoundKind::Upper.penalizes(-0.3));
        assert!(!BoundKind::Upper.penalizes(0.0));
    }

    #[test]
    fn lower_bound_penalizes_only_deficit() {
        assert!(BoundKind::Lower.penalizes(-0.3));
        assert!(!BoundKind::Lower.penalizes(0.3));
        assert!(!BoundKind::Lower.penalizes(0.0));
    }

    #[test]
    fn tags_parse_in_both_spellings() {
        assert_eq!(BoundKind::from_tag("equality").unwrap(), BoundKind::Equality);
        assert_eq!(BoundKind::from_tag("=").unwrap(), BoundKind::Equality);
        assert_eq!(BoundKind::from_tag("lower").unwrap(), BoundKind::Lower);
        assert_eq!(BoundKind::from_tag(">").unwrap(), BoundKind::Lower);
        assert_eq!(BoundKind::from_tag("upper").unwrap(), BoundKind::Upper);
        assert_eq!(BoundKind::from_tag("<").unwrap(), BoundKind::Upper);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = BoundKind::from_tag("between").unwrap_err();
        assert!(matches!(err, DataError::UnknownBoundKind { tag } if tag == "between"));
    }

    #[test]
    fn group_reports_its_length() {
        let group = ObservableGroup::new(
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![0.1, 0.2]),
            BoundKind::Equality,
        );
        assert_eq!(group.len(), 2);
        assert!(!group.is_empty());
    }
}
