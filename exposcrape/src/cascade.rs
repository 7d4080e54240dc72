//! Selector cascades: ordered (selector, extraction mode) rules evaluated by
//! one generic "first successful match" routine.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::surface::Surface;

static ATTRIBUTE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_:-]*)\s*$").expect("static regex is valid"));

/// What to read from a matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractMode {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRule {
    pub selector: String,
    pub mode: ExtractMode,
}

impl SelectorRule {
    /// Parse a configured selector entry.
    ///
    /// `sel@attr` reads `attr`; a selector starting with `meta` reads `content`;
    /// anything else reads the inner text.
    pub fn parse(raw: &str) -> Self {
        Self::parse_inner(raw, None)
    }

    /// Like [`SelectorRule::parse`] but entries without an explicit `@attr`
    /// (and not `meta`) read `default_attr`.
    pub fn parse_with_default(raw: &str, default_attr: &str) -> Self {
        Self::parse_inner(raw, Some(default_attr))
    }

    fn parse_inner(raw: &str, default_attr: Option<&str>) -> Self {
        let raw = raw.trim();
        if let Some(caps) = ATTRIBUTE_SUFFIX.captures(raw) {
            let whole = caps.get(0).map(|m| m.start()).unwrap_or(raw.len());
            let selector = raw[..whole].trim_end();
            if !selector.is_empty() && is_balanced(selector) {
                return Self {
                    selector: selector.to_string(),
                    mode: ExtractMode::Attribute(caps[1].to_string()),
                };
            }
        }

        let mode = if raw.to_ascii_lowercase().starts_with("meta") {
            ExtractMode::Attribute("content".to_string())
        } else {
            match default_attr {
                Some(attr) => ExtractMode::Attribute(attr.to_string()),
                None => ExtractMode::Text,
            }
        };
        Self {
            selector: raw.to_string(),
            mode,
        }
    }

    /// Trimmed value of the `index`-th match, `None` when missing or blank.
    pub fn read(&self, surface: &dyn Surface, index: usize) -> Result<Option<String>> {
        let value = match &self.mode {
            ExtractMode::Text => surface.inner_text(&self.selector, index)?,
            ExtractMode::Attribute(name) => surface.attribute(&self.selector, index, name)?,
        };
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

/// An `@` inside `[...]`, `(...)` or quotes belongs to the selector itself.
fn is_balanced(selector: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in selector.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth -= 1,
                _ => {}
            },
        }
    }
    depth == 0 && quote.is_none()
}

pub fn parse_rules(raw: &[String]) -> Vec<SelectorRule> {
    raw.iter().map(|r| SelectorRule::parse(r)).collect()
}

pub fn parse_rules_with_default(raw: &[String], default_attr: &str) -> Vec<SelectorRule> {
    raw.iter()
        .map(|r| SelectorRule::parse_with_default(r, default_attr))
        .collect()
}

/// Try `attempt` on each rule in order and return the first `Some`.
///
/// Errors from a rule are logged and treated as a miss.
pub fn first_success<T, F>(rules: &[SelectorRule], mut attempt: F) -> Option<T>
where
    F: FnMut(&SelectorRule) -> Result<Option<T>>,
{
    for rule in rules {
        match attempt(rule) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => debug!(selector = %rule.selector, "Selector failed: {}", e),
        }
    }
    None
}

/// Value of the first match of the first rule whose value passes `accept`.
pub fn first_match<F>(surface: &dyn Surface, rules: &[SelectorRule], accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    first_success(rules, |rule| {
        Ok(rule.read(surface, 0)?.filter(|value| accept(value)))
    })
}
