//! # Utilities Module
//!
//! Helper functions used across the backend: money formatting and
//! parsing, card number masking and check digits.
//!
//! Money helpers work on integer minor units (cents) end to end; no
//! value ever passes through floating point.

/// Format a minor-unit amount as a human-readable decimal string.
///
/// ## Examples
///
/// ```rust
/// use banking_backend::utils::format_minor_units;
/// assert_eq!(format_minor_units(123_456), "1,234.56");
/// assert_eq!(format_minor_units(50), "0.50");
/// ```
pub fn format_minor_units(amount_minor: i64) -> String {
    let negative = amount_minor < 0;
    let abs = amount_minor.unsigned_abs();
    let whole = abs / 100;
    let frac = abs % 100;

    // Add thousands separators to the whole part.
    let whole_str = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in whole_str.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let whole_grouped: String = grouped.chars().rev().collect();

    let sign = if negative { "-" } else { "" };
    format!("{}{}.{:02}", sign, whole_grouped, frac)
}

/// Parse a decimal amount string into minor units.
///
/// Accepts at most two fraction digits and optional thousands
/// separators. Parsing is digit-by-digit integer arithmetic, so values
/// round-trip exactly.
///
/// ## Examples
///
/// ```rust
/// use banking_backend::utils::parse_minor_units;
/// assert_eq!(parse_minor_units("100.00"), Ok(10_000));
/// assert_eq!(parse_minor_units("1,234.5"), Ok(123_450));
/// assert_eq!(parse_minor_units("7"), Ok(700));
/// ```
pub fn parse_minor_units(amount_str: &str) -> Result<i64, String> {
    let cleaned = amount_str.trim().replace(',', "");
    if cleaned.is_empty() {
        return Err(format!("Invalid amount: {amount_str}"));
    }

    let (whole_str, frac_str) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    if frac_str.len() > 2 {
        return Err(format!(
            "Too many fraction digits (max 2): {amount_str}"
        ));
    }
    if whole_str.starts_with('-') {
        return Err("Amount cannot be negative".to_string());
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
        || whole_str.is_empty()
    {
        return Err(format!("Invalid amount: {amount_str}"));
    }

    let whole: i64 = whole_str
        .parse()
        .map_err(|_| format!("Amount out of range: {amount_str}"))?;
    let mut frac: i64 = if frac_str.is_empty() {
        0
    } else {
        frac_str
            .parse()
            .map_err(|_| format!("Invalid amount: {amount_str}"))?
    };
    if frac_str.len() == 1 {
        frac *= 10;
    }

    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| format!("Amount out of range: {amount_str}"))
}

/// Mask a card number for display, keeping the last four digits.
pub fn mask_card_number(card_number: &str) -> String {
    let last_four: String = card_number
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("**** **** **** {last_four}")
}

/// Compute the Luhn check digit for a digit string.
///
/// Issued card numbers are 15 random digits plus this check digit, so
/// they pass standard card number validation.
pub fn luhn_check_digit(digits: &str) -> u8 {
    let mut sum: u32 = 0;
    // Walk right-to-left; the rightmost digit of the payload is doubled.
    for (i, c) in digits.chars().rev().enumerate() {
        let mut d = c.to_digit(10).unwrap_or(0);
        if i % 2 == 0 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    ((10 - (sum % 10)) % 10) as u8
}

/// Validate a full card number's Luhn checksum.
pub fn luhn_valid(card_number: &str) -> bool {
    if card_number.is_empty() || !card_number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (payload, check) = card_number.split_at(card_number.len() - 1);
    let expected = luhn_check_digit(payload);
    check.chars().next().and_then(|c| c.to_digit(10)) == Some(expected as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(100), "1.00");
        assert_eq!(format_minor_units(0), "0.00");
        assert_eq!(format_minor_units(50), "0.50");
        assert_eq!(format_minor_units(123_456_789), "1,234,567.89");
        assert_eq!(format_minor_units(-2_05), "-2.05");
    }

    #[test]
    fn test_parse_minor_units() {
        assert_eq!(parse_minor_units("100.00"), Ok(10_000));
        assert_eq!(parse_minor_units("1.5"), Ok(150));
        assert_eq!(parse_minor_units("0"), Ok(0));
        assert_eq!(parse_minor_units("1,234.56"), Ok(123_456));
        assert!(parse_minor_units("-1").is_err());
        assert!(parse_minor_units("1.005").is_err());
        assert!(parse_minor_units("abc").is_err());
        assert!(parse_minor_units("").is_err());
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(
            mask_card_number("4539148803436467"),
            "**** **** **** 6467"
        );
    }

    #[test]
    fn test_luhn() {
        // Known-good test numbers.
        assert!(luhn_valid("4539148803436467"));
        assert!(luhn_valid("79927398713"));
        assert!(!luhn_valid("79927398714"));
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("4539x48803436467"));
    }

    proptest! {
        #[test]
        fn format_parse_round_trip(amount in 0i64..=92_233_720_368_547_757) {
            let formatted = format_minor_units(amount);
            prop_assert_eq!(parse_minor_units(&formatted), Ok(amount));
        }

        #[test]
        fn generated_check_digit_validates(payload in "[0-9]{15}") {
            let check = luhn_check_digit(&payload);
            let full = format!("{payload}{check}");
            prop_assert!(luhn_valid(&full));
        }
    }
}
