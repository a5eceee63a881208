//! Notification recipient tests
//!
//! Tests for contact normalisation including:
//! - Property 14: WhatsApp Number Normalisation

use proptest::prelude::*;
use shared::{normalize_indonesian_phone, validate_email};

/// Indonesian mobile numbers in the local `08…` form
fn local_mobile_strategy() -> impl Strategy<Value = String> {
    "8[1-9][0-9]{7,10}".prop_map(|n| format!("0{}", n))
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 14: Local, international and `+62` forms normalise to the same number
    #[test]
    fn test_phone_forms_agree(local in local_mobile_strategy()) {
        let national = &local[1..];
        let from_local = normalize_indonesian_phone(&local).unwrap();
        let from_intl = normalize_indonesian_phone(&format!("62{}", national)).unwrap();
        let from_plus = normalize_indonesian_phone(&format!("+62 {}", national)).unwrap();

        prop_assert_eq!(&from_local, &from_intl);
        prop_assert_eq!(&from_local, &from_plus);
        prop_assert!(from_local.starts_with("628"));
    }

    /// Property 14: Normalised output is digits only
    #[test]
    fn test_normalised_phone_is_digits(local in local_mobile_strategy()) {
        let normalised = normalize_indonesian_phone(&local).unwrap();
        prop_assert!(normalised.chars().all(|c| c.is_ascii_digit()));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_landline_not_used_for_whatsapp() {
        assert!(normalize_indonesian_phone("021-5551234").is_err());
    }

    #[test]
    fn test_email_recipients() {
        assert!(validate_email("akuntan@sppg-bandung.id").is_ok());
        assert!(validate_email("akuntan@").is_err());
        assert!(validate_email("akuntan.sppg.id").is_err());
    }
}
