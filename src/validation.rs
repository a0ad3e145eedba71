//! Input sanitization and validation for invitation and provisioning payloads.
//!
//! Sanitization always runs first and never fails; validation then collects
//! every problem into one list so callers surface all of them in a single
//! 400 instead of drip-feeding errors.

use validator::ValidateEmail;

use crate::config::InvitePolicy;

const MAX_FIELD_LEN: usize = 255;

/// Strips control characters and HTML/script metacharacters, then truncates.
/// Keeps whatever benign text remains; rejection is validation's job.
pub fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&' | ';' | '\\'))
        .collect();
    let trimmed = cleaned.trim();
    trimmed.chars().take(MAX_FIELD_LEN).collect()
}

/// Raw invite fields as they arrived on the wire, pre-sanitization.
#[derive(Debug, Clone)]
pub struct InviteInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
}

/// The same fields after sanitization and a clean validation pass.
#[derive(Debug, Clone)]
pub struct ValidInvite {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
}

pub fn validate_invite(
    input: &InviteInput,
    policy: &InvitePolicy,
) -> Result<ValidInvite, Vec<String>> {
    let mut errors = Vec::new();

    let email = sanitize(&input.email).to_lowercase();
    if !email.validate_email() {
        errors.push("email is not a valid address".to_string());
    } else if let Some(domain) = email.rsplit('@').next() {
        if policy
            .disposable_domains
            .iter()
            .any(|blocked| domain.contains(blocked.as_str()))
        {
            errors.push("email domain is not accepted".to_string());
        }
    }

    let first_name = sanitize(&input.first_name);
    if let Err(e) = check_name("first_name", &first_name) {
        errors.push(e);
    }
    let last_name = sanitize(&input.last_name);
    if let Err(e) = check_name("last_name", &last_name) {
        errors.push(e);
    }

    let phone = match input.phone.as_deref() {
        Some(raw) => {
            let phone = sanitize(raw);
            if phone.is_empty() {
                None
            } else {
                if let Err(e) = check_phone(&phone) {
                    errors.push(e);
                }
                Some(phone)
            }
        }
        None => None,
    };

    if let Some(rate) = input.hourly_rate {
        if let Err(e) = check_rate("hourly_rate", rate, policy.max_hourly_rate) {
            errors.push(e);
        }
    }
    if let Some(rate) = input.per_drop_rate {
        if let Err(e) = check_rate("per_drop_rate", rate, policy.max_per_drop_rate) {
            errors.push(e);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidInvite {
        email,
        first_name,
        last_name,
        phone,
        hourly_rate: input.hourly_rate,
        per_drop_rate: input.per_drop_rate,
    })
}

fn check_name(field: &str, value: &str) -> Result<(), String> {
    let len = value.chars().count();
    if !(2..=50).contains(&len) {
        return Err(format!("{field} must be between 2 and 50 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_alphabetic() || matches!(c, ' ' | '\'' | '-'))
    {
        return Err(format!(
            "{field} may only contain letters, spaces, apostrophes and hyphens"
        ));
    }
    Ok(())
}

/// Loose international shape: optional leading `+`, digits with common
/// separators, 10-15 significant characters.
fn check_phone(value: &str) -> Result<(), String> {
    let significant: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')' | '-' | '.'))
        .collect();
    let digits = significant.strip_prefix('+').unwrap_or(&significant);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("phone may only contain digits, separators and a leading +".to_string());
    }
    if !(10..=15).contains(&significant.chars().count()) {
        return Err("phone must have between 10 and 15 significant characters".to_string());
    }
    Ok(())
}

fn check_rate(field: &str, value: f64, ceiling: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a non-negative number"));
    }
    if value > ceiling {
        return Err(format!("{field} must not exceed {ceiling}"));
    }
    Ok(())
}
