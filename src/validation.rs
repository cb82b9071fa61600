// validation.rs
//
// Client-boundary checks that must pass before any network call is made.
// An invalid phone number or amount is reported immediately and never
// reaches the gateway or the store.
use validator::ValidationError;

const COUNTRY_CODES: [&str; 4] = ["254", "255", "256", "250"];
const MSISDN_LEN: usize = 12;

/// Accepts East African MSISDNs only: a Kenya/Tanzania/Uganda/Rwanda
/// country code followed by exactly 9 digits. Local formats such as
/// `0712345678` are rejected, not normalized.
pub fn msisdn(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();

    if phone.len() != MSISDN_LEN || !phone.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("msisdn");
        err.message = Some("phone number must be a 12-digit MSISDN, e.g. 254712345678".into());
        return Err(err);
    }

    if !COUNTRY_CODES.iter().any(|code| phone.starts_with(code)) {
        let mut err = ValidationError::new("msisdn");
        err.message = Some("phone number must start with country code 254, 255, 256 or 250".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_supported_country_codes() {
        for phone in ["254712345678", "255712345678", "256712345678", "250712345678"] {
            assert!(msisdn(phone).is_ok(), "expected {} to validate", phone);
        }
    }

    #[test]
    fn rejects_local_format_without_country_code() {
        assert!(msisdn("0712345678").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(msisdn("25471234567").is_err());
        assert!(msisdn("2547123456789").is_err());
        assert!(msisdn("").is_err());
    }

    #[test]
    fn rejects_non_digits() {
        assert!(msisdn("25471234567a").is_err());
        assert!(msisdn("+254712345678").is_err());
    }

    #[test]
    fn rejects_unsupported_country_code() {
        assert!(msisdn("234712345678").is_err());
        assert!(msisdn("257712345678").is_err());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert!(msisdn(" 254712345678 ").is_ok());
    }
}
