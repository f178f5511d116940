use crate::shared::constants::{MAX_DESCRIPTION_CHARS, MAX_LIST_LIMIT, MAX_PERSON_NAME_CHARS};
use crate::shared::error::ValidationError;

/// Trims `name` and checks it is non-empty and within the character limit.
pub fn validate_person_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPersonName);
    }
    let len = trimmed.chars().count();
    if len > MAX_PERSON_NAME_CHARS {
        return Err(ValidationError::PersonNameTooLong {
            len,
            max: MAX_PERSON_NAME_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as absent.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(trimmed) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(Some(trimmed.to_string()))
}

pub fn validate_confidence(confidence: f64, minimum: f64) -> Result<(), ValidationError> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ValidationError::Confidence(confidence));
    }
    if confidence < minimum {
        return Err(ValidationError::LowConfidence {
            confidence,
            minimum,
        });
    }
    Ok(())
}

pub fn validate_limit(limit: usize) -> Result<usize, ValidationError> {
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ValidationError::Limit {
            limit,
            max: MAX_LIST_LIMIT,
        });
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Alice", "Alice")]
    #[case("  Bob Smith \n", "Bob Smith")]
    #[case("Zoë", "Zoë")]
    fn test_person_name_is_trimmed(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(validate_person_name(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_empty_person_name(#[case] raw: &str) {
        assert_eq!(
            validate_person_name(raw),
            Err(ValidationError::EmptyPersonName)
        );
    }

    #[test]
    fn test_person_name_length_counts_chars_not_bytes() {
        assert!(validate_person_name(&"é".repeat(100)).is_ok());
        assert_eq!(
            validate_person_name(&"a".repeat(101)),
            Err(ValidationError::PersonNameTooLong { len: 101, max: 100 })
        );
    }

    #[test]
    fn test_description_limits() {
        assert_eq!(validate_description(None), Ok(None));
        assert_eq!(validate_description(Some("  ")), Ok(None));
        assert_eq!(
            validate_description(Some(" front door ")),
            Ok(Some("front door".into()))
        );
        assert!(validate_description(Some(&"x".repeat(500))).is_ok());
        assert_eq!(
            validate_description(Some(&"x".repeat(501))),
            Err(ValidationError::DescriptionTooLong { len: 501, max: 500 })
        );
    }

    #[rstest]
    #[case::at_minimum(0.5, 0.5, true)]
    #[case::above(0.93, 0.5, true)]
    #[case::below(0.49, 0.5, false)]
    #[case::no_floor(0.0, 0.0, true)]
    fn test_confidence_floor(#[case] confidence: f64, #[case] minimum: f64, #[case] ok: bool) {
        assert_eq!(validate_confidence(confidence, minimum).is_ok(), ok);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(-0.1)]
    #[case(1.01)]
    fn test_confidence_out_of_range(#[case] confidence: f64) {
        assert!(matches!(
            validate_confidence(confidence, 0.0),
            Err(ValidationError::Confidence(_))
        ));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(100, true)]
    #[case(1000, true)]
    #[case(1001, false)]
    fn test_limit_range(#[case] limit: usize, #[case] ok: bool) {
        assert_eq!(validate_limit(limit).is_ok(), ok);
    }
}
