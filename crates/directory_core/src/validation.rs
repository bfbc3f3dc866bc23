//! Local checks run before any guest is sent to the store.

use chrono::NaiveDate;
use shared::domain::GuestFields;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("First, last name, and email are required.")]
    MissingRequired,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Date of birth must be a date in YYYY-MM-DD format.")]
    InvalidDateOfBirth,
}

/// Checks required fields first, then the email shape, then the optional
/// date of birth.
pub fn validate(fields: &GuestFields) -> Result<(), ValidationError> {
    let required = [&fields.first_name, &fields.last_name, &fields.email];
    if required.iter().any(|value| value.trim().is_empty()) {
        return Err(ValidationError::MissingRequired);
    }

    if !is_valid_email(&fields.email) {
        return Err(ValidationError::InvalidEmail);
    }

    let date_of_birth = fields.date_of_birth.trim();
    if !date_of_birth.is_empty() && NaiveDate::parse_from_str(date_of_birth, "%Y-%m-%d").is_err() {
        return Err(ValidationError::InvalidDateOfBirth);
    }

    Ok(())
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// The field set that is actually submitted: surrounding whitespace removed.
pub fn normalized(fields: &GuestFields) -> GuestFields {
    GuestFields {
        first_name: fields.first_name.trim().to_string(),
        last_name: fields.last_name.trim().to_string(),
        email: fields.email.trim().to_string(),
        phone: fields.phone.trim().to_string(),
        address: fields.address.trim().to_string(),
        date_of_birth: fields.date_of_birth.trim().to_string(),
    }
}
