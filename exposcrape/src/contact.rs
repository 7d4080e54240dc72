//! Phone and email extraction from free text and `tel:`/`mailto:` hrefs.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length of a cleaned phone number.
pub const MIN_PHONE_LEN: usize = 10;

static NON_PHONE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\d+\-\s()]").expect("static regex is valid"));

/// Ordered phone patterns plus the email pattern, compiled from config.
#[derive(Debug, Clone)]
pub struct ContactPatterns {
    phone: Vec<Regex>,
    email: Regex,
}

impl ContactPatterns {
    pub fn new(phone: Vec<Regex>, email: Regex) -> Self {
        Self { phone, email }
    }

    /// First phone number found by the ordered pattern list.
    ///
    /// Each pattern contributes only its first match. A match is cleaned down to
    /// digits, `+`, `-`, spaces and parentheses; if that leaves fewer than
    /// [`MIN_PHONE_LEN`] characters the next pattern is tried.
    pub fn extract_phone(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        for pattern in &self.phone {
            if let Some(m) = pattern.find(text) {
                let cleaned = clean_phone(m.as_str());
                if cleaned.len() >= MIN_PHONE_LEN {
                    return Some(cleaned);
                }
            }
        }
        None
    }

    pub fn extract_email(&self, text: &str) -> Option<String> {
        self.email.find(text).map(|m| m.as_str().to_string())
    }
}

/// Strip everything but digits, `+`, `-`, whitespace and parentheses.
pub fn clean_phone(raw: &str) -> String {
    NON_PHONE_CHARS.replace_all(raw, "").trim().to_string()
}

/// Phone number carried by a `tel:` href.
pub fn phone_from_href(href: &str) -> Option<String> {
    let number = strip_scheme(href, "tel:")?;
    let number = number.trim();
    (!number.is_empty()).then(|| number.to_string())
}

/// Address carried by a `mailto:` href, without any `?subject=` query.
pub fn email_from_href(href: &str) -> Option<String> {
    let address = strip_scheme(href, "mailto:")?;
    let address = address.split('?').next().unwrap_or_default().trim();
    (!address.is_empty()).then(|| address.to_string())
}

fn strip_scheme<'a>(href: &'a str, scheme: &str) -> Option<&'a str> {
    let href = href.trim();
    // `get` rather than indexing: the cut may fall inside a multi-byte char
    match (href.get(..scheme.len()), href.get(scheme.len()..)) {
        (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case(scheme) => Some(rest),
        _ => None,
    }
}
