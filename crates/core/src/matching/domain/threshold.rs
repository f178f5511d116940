use crate::shared::error::ValidationError;

/// A similarity threshold known to be finite and within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    /// Out-of-range values are rejected rather than clamped.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::Threshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_met_by(self, score: f64) -> bool {
        score >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(0.6)]
    #[case(1.0)]
    fn test_accepts_closed_unit_interval(#[case] value: f64) {
        assert_eq!(Threshold::new(value).unwrap().value(), value);
    }

    #[rstest]
    #[case(1.5)]
    #[case(-0.01)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_rejects_out_of_range(#[case] value: f64) {
        assert!(matches!(
            Threshold::new(value),
            Err(ValidationError::Threshold(_))
        ));
    }

    #[test]
    fn test_is_met_by_is_inclusive() {
        let t = Threshold::new(0.6).unwrap();
        assert!(t.is_met_by(0.6));
        assert!(t.is_met_by(0.61));
        assert!(!t.is_met_by(0.59));
    }
}
