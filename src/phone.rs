//! Indonesian mobile number normalization.
//!
//! Accepts the formats people actually type (`0812-3456-7890`, `812 3456 7890`,
//! `+62 812 3456 7890`, `6281234567890`) and produces the canonical
//! `62XXXXXXXXXX` form the WhatsApp gateway expects.

use std::fmt;

use serde::Serialize;

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// Three-digit mobile carrier codes that follow the `62` country code.
const CARRIER_PREFIXES: &[&str] = &[
    // Telkomsel
    "811", "812", "813", "821", "822", "823", "851", "852", "853",
    // Indosat
    "814", "815", "816", "855", "856", "857", "858",
    // XL
    "817", "818", "819", "859", "877", "878",
    // Axis
    "831", "832", "833", "838",
    // Three
    "895", "896", "897", "898", "899",
    // Smartfren
    "881", "882", "883", "884", "885", "886", "887", "888", "889",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhoneError {
    #[error("Nomor HP wajib diisi")]
    Required,
    #[error("Nomor HP terlalu pendek (minimal 10 digit)")]
    TooShort,
    #[error("Nomor HP terlalu panjang (maksimal 15 digit)")]
    TooLong,
    #[error("Format nomor HP tidak valid, gunakan format 08xx atau 628xx")]
    InvalidFormat,
    #[error("Kode operator nomor HP tidak dikenali")]
    InvalidProvider,
}

impl PhoneError {
    pub fn code(&self) -> &'static str {
        match self {
            PhoneError::Required => "REQUIRED",
            PhoneError::TooShort => "TOO_SHORT",
            PhoneError::TooLong => "TOO_LONG",
            PhoneError::InvalidFormat => "INVALID_FORMAT",
            PhoneError::InvalidProvider => "INVALID_PROVIDER",
        }
    }
}

/// A mobile number in canonical `628…` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(PhoneError::Required);
        }
        if digits.len() < MIN_DIGITS {
            return Err(PhoneError::TooShort);
        }
        if digits.len() > MAX_DIGITS {
            return Err(PhoneError::TooLong);
        }

        let canonical = if let Some(rest) = digits.strip_prefix('0') {
            format!("62{rest}")
        } else if digits.starts_with("62") {
            digits
        } else if digits.starts_with('8') {
            format!("62{digits}")
        } else {
            return Err(PhoneError::InvalidFormat);
        };

        if !is_canonical_shape(&canonical) {
            return Err(PhoneError::InvalidFormat);
        }

        if !CARRIER_PREFIXES.contains(&&canonical[2..5]) {
            return Err(PhoneError::InvalidProvider);
        }

        Ok(PhoneNumber(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ^628[0-9]{8,12}$
fn is_canonical_shape(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("628") else {
        return false;
    };
    (8..=12).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PhoneValidationError>,
}

#[derive(Debug, Serialize)]
pub struct PhoneValidationError {
    pub code: &'static str,
    pub message: String,
}

pub fn validate_phone(raw: &str) -> PhoneValidation {
    match PhoneNumber::parse(raw) {
        Ok(phone) => PhoneValidation {
            is_valid: true,
            normalized_phone: Some(phone.into_inner()),
            error: None,
        },
        Err(e) => PhoneValidation {
            is_valid: false,
            normalized_phone: None,
            error: Some(PhoneValidationError {
                code: e.code(),
                message: e.to_string(),
            }),
        },
    }
}
