use std::collections::HashSet;

use stp_core::{EntityRecord, LocaleSettings, Money, ValidationResult, ValidationSettings};

/// Field-level checks over an [`EntityRecord`].
///
/// The test-identifier allow-lists only apply when `permissive_test_mode` is
/// switched on in the settings; otherwise every value goes through its checksum.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    home_country: String,
    home_iban_length: usize,
    min_iban_length: usize,
    permissive: bool,
    test_national_ids: HashSet<String>,
    test_iban_prefixes: Vec<String>,
}

impl FieldValidator {
    pub fn new(locale: &LocaleSettings, settings: &ValidationSettings) -> Self {
        if settings.permissive_test_mode {
            tracing::warn!("permissive test mode enabled, test identifiers bypass checksums");
        }
        Self {
            home_country: locale.home_country.to_ascii_uppercase(),
            home_iban_length: locale.iban_length,
            min_iban_length: settings.min_iban_length,
            permissive: settings.permissive_test_mode,
            test_national_ids: settings.test_national_ids.iter().cloned().collect(),
            test_iban_prefixes: settings
                .test_iban_prefixes
                .iter()
                .map(|p| p.to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn validate_national_id(&self, id: &str) -> bool {
        let digits: Vec<u8> = id
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| d as u8)
            .collect();
        let Ok(digits) = <[u8; 11]>::try_from(digits) else {
            return false;
        };
        if digits[0] == 0 || digits.iter().all(|&d| d == digits[0]) {
            return false;
        }
        if self.permissive {
            let joined: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            if self.test_national_ids.contains(&joined) {
                tracing::debug!(id = %joined, "test national ID accepted");
                return true;
            }
        }
        national_id_checksum(&digits)
    }

    pub fn validate_iban(&self, iban: &str) -> bool {
        let iban: String = iban
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if iban.len() < self.min_iban_length {
            return false;
        }
        let bytes = iban.as_bytes();
        let shape_ok = bytes.len() > 4
            && bytes[..2].iter().all(u8::is_ascii_uppercase)
            && bytes[2..4].iter().all(u8::is_ascii_digit)
            && bytes[4..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if !shape_ok {
            return false;
        }
        if iban.starts_with(&self.home_country) && iban.len() != self.home_iban_length {
            return false;
        }
        if self.permissive && self.test_iban_prefixes.iter().any(|p| iban.starts_with(p.as_str())) {
            tracing::debug!(%iban, "test IBAN prefix accepted");
            return true;
        }
        iban_remainder(&iban) == Some(1)
    }

    pub fn validate_amount(amount: Option<Money>) -> bool {
        amount.is_some_and(Money::is_positive)
    }

    pub fn validate(&self, record: &EntityRecord) -> ValidationResult {
        let national_id_valid = record
            .national_id()
            .is_some_and(|id| self.validate_national_id(id));
        let sender_iban_valid = record
            .sender_iban()
            .is_some_and(|iban| self.validate_iban(iban));
        let receiver_iban_valid = record
            .receiver_iban()
            .is_some_and(|iban| self.validate_iban(iban));
        let amount_valid = Self::validate_amount(record.transaction_amount());

        let result = ValidationResult::from_checks(
            national_id_valid,
            sender_iban_valid,
            receiver_iban_valid,
            amount_valid,
        );
        tracing::debug!(
            national_id_valid,
            sender_iban_valid,
            receiver_iban_valid,
            amount_valid,
            score = result.validation_score,
            "record validated"
        );
        result
    }
}

/// Both check digits of an 11-digit national ID.
pub fn national_id_checksum(d: &[u8; 11]) -> bool {
    let odd: i32 = [d[0], d[2], d[4], d[6], d[8]].iter().map(|&x| x as i32).sum();
    let even: i32 = [d[1], d[3], d[5], d[7]].iter().map(|&x| x as i32).sum();
    let check10 = (odd * 7 - even).rem_euclid(10);
    let check11 = d[..10].iter().map(|&x| x as i32).sum::<i32>() % 10;
    check10 == d[9] as i32 && check11 == d[10] as i32
}

/// ISO 7064 MOD-97-10 remainder of an IBAN after moving the first four
/// characters to the end. `None` for characters outside `[0-9A-Z]`.
pub fn iban_remainder(iban: &str) -> Option<u32> {
    if iban.len() < 4 || !iban.is_ascii() {
        return None;
    }
    let (head, tail) = iban.split_at(4);
    tail.chars().chain(head.chars()).try_fold(0u32, |rem, c| match c {
        '0'..='9' => Some((rem * 10 + c as u32 - '0' as u32) % 97),
        'A'..='Z' => Some((rem * 100 + c as u32 - 'A' as u32 + 10) % 97),
        _ => None,
    })
}
