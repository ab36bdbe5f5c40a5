//! # Phone Number Normalisation
//!
//! Daraja requires MSISDNs in `2547XXXXXXXX` form. Callers type
//! `0712 345 678` or `+254712345678`; both normalise to the same
//! wire format.

/// Normalises a Kenyan phone number for the Daraja API.
///
/// Rules, applied to the trimmed input:
/// * a leading `+` is stripped
/// * a leading `0` is replaced with `254`
/// * anything else passes through unchanged (already in country form)
pub fn normalize_msisdn(input: &str) -> String {
    let trimmed = input.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);

    match without_plus.strip_prefix('0') {
        Some(rest) => format!("254{rest}"),
        None => without_plus.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_format() {
        assert_eq!(normalize_msisdn("0712345678"), "254712345678");
    }

    #[test]
    fn test_plus_prefix() {
        assert_eq!(normalize_msisdn("+254712345678"), "254712345678");
    }

    #[test]
    fn test_already_normalised() {
        assert_eq!(normalize_msisdn("254712345678"), "254712345678");
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(normalize_msisdn("  0712345678  "), "254712345678");
    }

    #[test]
    fn test_plus_then_zero_both_applied() {
        // "+0..." is malformed but the original rules still apply in
        // sequence: strip the plus, then expand the zero.
        assert_eq!(normalize_msisdn("+0712345678"), "254712345678");
    }
}
