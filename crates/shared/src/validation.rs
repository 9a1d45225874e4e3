//! Common validation utilities.

use validator::ValidationError;

/// Maximum length for free-text notes and reasons.
pub const MAX_NOTE_LENGTH: usize = 1000;

/// Validates that a free-text value contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that free text stays within [`MAX_NOTE_LENGTH`] characters.
pub fn validate_note_length(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() <= MAX_NOTE_LENGTH {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("Text must be at most {} characters", MAX_NOTE_LENGTH).into());
        err.add_param("max".into(), &MAX_NOTE_LENGTH);
        Err(err)
    }
}

/// Validates a mandatory free-text reason: not blank, within the note limit.
pub fn validate_reason(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;
    validate_note_length(value)
}

/// Validates that all three visit attestations were confirmed.
///
/// The error message names every attestation still missing so the caller
/// can show it to the field worker as-is.
pub fn validate_attestations(
    confirmed_location: bool,
    confirmed_time: bool,
    confirmed_identity: bool,
) -> Result<(), ValidationError> {
    let missing: Vec<&str> = [
        (confirmed_location, "location"),
        (confirmed_time, "time"),
        (confirmed_identity, "identity"),
    ]
    .iter()
    .filter(|(confirmed, _)| !confirmed)
    .map(|(_, name)| *name)
    .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let mut err = ValidationError::new("attestations_incomplete");
    err.message = Some(
        format!(
            "All attestations must be confirmed (missing: {})",
            missing.join(", ")
        )
        .into(),
    );
    Err(err)
}

/// Validates that a distance in meters is finite and non-negative.
pub fn validate_distance_meters(distance: f64) -> Result<(), ValidationError> {
    if distance.is_finite() && distance >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("distance_range");
        err.message = Some("Distance must be a non-negative number of meters".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::lorem::en::Sentence;
    use fake::Fake;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("insufficient evidence").is_ok());
        assert!(validate_not_blank(" x ").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   \t\n").is_err());
    }

    #[test]
    fn test_validate_not_blank_generated_text() {
        let sentence: String = Sentence(3..8).fake();
        assert!(validate_not_blank(&sentence).is_ok());
    }

    #[test]
    fn test_validate_not_blank_error_message() {
        let err = validate_not_blank("").unwrap_err();
        assert_eq!(err.message.unwrap().to_string(), "Value must not be blank");
    }

    #[test]
    fn test_validate_note_length_counts_characters() {
        assert!(validate_note_length("").is_ok());
        assert!(validate_note_length(&"x".repeat(MAX_NOTE_LENGTH)).is_ok());
        // Multi-byte characters count once each.
        assert!(validate_note_length(&"é".repeat(MAX_NOTE_LENGTH)).is_ok());

        let err = validate_note_length(&"x".repeat(MAX_NOTE_LENGTH + 1)).unwrap_err();
        assert_eq!(err.code, "length");
        assert_eq!(
            err.message.unwrap().to_string(),
            "Text must be at most 1000 characters"
        );
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("insufficient evidence").is_ok());
        assert_eq!(validate_reason("  ").unwrap_err().code, "blank");
        assert_eq!(
            validate_reason(&"r".repeat(MAX_NOTE_LENGTH + 1))
                .unwrap_err()
                .code,
            "length"
        );
    }

    #[test]
    fn test_validate_attestations_all_confirmed() {
        assert!(validate_attestations(true, true, true).is_ok());
    }

    #[test]
    fn test_validate_attestations_any_missing() {
        assert!(validate_attestations(false, true, true).is_err());
        assert!(validate_attestations(true, false, true).is_err());
        assert!(validate_attestations(true, true, false).is_err());
        assert!(validate_attestations(false, false, false).is_err());
    }

    #[test]
    fn test_validate_attestations_error_lists_missing() {
        let err = validate_attestations(false, true, false).unwrap_err();
        assert_eq!(err.code, "attestations_incomplete");
        assert_eq!(
            err.message.unwrap().to_string(),
            "All attestations must be confirmed (missing: location, identity)"
        );
    }

    #[test]
    fn test_validate_distance_meters() {
        assert!(validate_distance_meters(0.0).is_ok());
        assert!(validate_distance_meters(45.3).is_ok());
        assert!(validate_distance_meters(-0.1).is_err());
        assert!(validate_distance_meters(f64::NAN).is_err());
        assert!(validate_distance_meters(f64::INFINITY).is_err());
    }
}
