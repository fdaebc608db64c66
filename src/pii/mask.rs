//! Masking strategies
//!
//! Pure and total: every input yields a masked string, and anything a
//! strategy cannot parse is fully redacted.

use crate::pii::rules::{MaskingRule, MaskingStrategy};

pub const REDACTED: &str = "****";

pub fn mask(value: &str, rule: &MaskingRule) -> String {
    mask_with(value, rule.strategy)
}

pub fn mask_with(value: &str, strategy: MaskingStrategy) -> String {
    match strategy {
        MaskingStrategy::Email => mask_email(value),
        MaskingStrategy::Phone => mask_phone(value),
        MaskingStrategy::PersonalName | MaskingStrategy::GenericIdentifier => REDACTED.to_string(),
        MaskingStrategy::PostalAddress => mask_address(value),
    }
}

/// `jane.doe@example.com` → `***@example.com`
fn mask_email(value: &str) -> String {
    match value.trim().split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.chars().any(char::is_whitespace) =>
        {
            format!("***@{}", domain)
        }
        _ => REDACTED.to_string(),
    }
}

/// `(555) 123-4567` → `***-***-4567`
fn mask_phone(value: &str) -> String {
    let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 4 {
        return REDACTED.to_string();
    }

    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("***-***-{}", last4)
}

/// `12 Main St, Apt 5B, Springfield` → `** **** **, Apt **, Springfield`
fn mask_address(value: &str) -> String {
    let trimmed = value.trim();
    let (street, rest) = match trimmed.split_once(',') {
        Some((street, rest)) => (street, Some(rest)),
        None => (trimmed, None),
    };

    let has_content = street.chars().any(|c| c.is_alphanumeric() || c == '*');
    if !has_content {
        return REDACTED.to_string();
    }

    let masked: String = street
        .chars()
        .map(|c| if c.is_alphanumeric() { '*' } else { c })
        .collect();

    match rest {
        Some(rest) => format!("{},{}", masked, mask_numbered_runs(rest)),
        None => masked,
    }
}

/// Unit numbers and postcodes: any alphanumeric run holding a digit.
fn mask_numbered_runs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.chars().any(|c| c.is_ascii_digit()) {
            out.extend(run.chars().map(|_| '*'));
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in value.chars() {
        if c.is_alphanumeric() {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);

    out
}
