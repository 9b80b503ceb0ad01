//! MAC address canonicalization for walk and bridge-table entries.

use crate::types::WireValue;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacFormatError {
    #[error("value does not contain 6 octets")]
    WrongLength,
    #[error("value contains a non-hexadecimal digit")]
    InvalidDigit,
    #[error("value type cannot carry a MAC address")]
    WrongType,
}

/// Formats an SNMP value as `AA:BB:CC:DD:EE:FF`.
///
/// Accepts a raw 6-octet string or a textual form (12 hex digits,
/// optionally delimited by `:`, `-` or spaces). Anything else is an error
/// the caller skips per entry; one malformed row never aborts a walk.
pub fn format_mac(value: &WireValue) -> Result<String, MacFormatError> {
    match value {
        WireValue::OctetString(bytes) => {
            if bytes.len() == 6 {
                return Ok(bytes
                    .iter()
                    .map(|b| format!("{b:02X}"))
                    .collect::<Vec<_>>()
                    .join(":"));
            }
            match std::str::from_utf8(bytes) {
                Ok(s) => format_mac_str(s),
                Err(_) => Err(MacFormatError::WrongLength),
            }
        }
        _ => Err(MacFormatError::WrongType),
    }
}

/// Textual variant of [`format_mac`], used where the source protocol
/// reports MACs as strings.
pub fn format_mac_str(s: &str) -> Result<String, MacFormatError> {
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    if digits.len() != 12 {
        return Err(MacFormatError::WrongLength);
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MacFormatError::InvalidDigit);
    }
    let upper = digits.to_ascii_uppercase();
    Ok(upper
        .as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join(":"))
}
