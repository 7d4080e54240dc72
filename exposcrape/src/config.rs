//! Configuration management for exposcrape
//!
//! All configuration is loaded from `./config/exposcrape.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::cascade::{parse_rules, parse_rules_with_default, SelectorRule};
use crate::contact::ContactPatterns;
use crate::social::{PlatformFamilies, SocialClassifier};

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/exposcrape.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/exposcrape.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid regex pattern '{pattern_name}': {error}\n  Pattern: {pattern}")]
    InvalidRegex {
        pattern_name: String,
        pattern: String,
        error: String,
    },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub pacing: PacingConfig,
    pub navigation: NavigationConfig,
    pub selectors: SelectorsConfig,
    pub patterns: PatternsConfig,
    pub social: SocialConfig,
}

/// Headless Chrome launch settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Navigation/operation timeout enforced by the browser
    pub timeout_secs: u64,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Pauses between page interactions (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// After the listing first loads
    pub settle_ms: u64,
    /// After navigating to a detail page
    pub navigation_ms: u64,
    /// After clicking a list item
    pub click_ms: u64,
    /// Before reading a detail surface
    pub extract_ms: u64,
    /// After dismissing a consent banner or overlay
    pub dismiss_ms: u64,
    pub scroll_ms: u64,
    pub key_ms: u64,
    pub lazy_load_ms: u64,
    pub load_more_click_ms: u64,
}

/// Timing values as durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub settle: Duration,
    pub navigation: Duration,
    pub click: Duration,
    pub extract: Duration,
    pub dismiss: Duration,
    pub scroll: Duration,
    pub key: Duration,
    pub lazy_load: Duration,
    pub load_more_click: Duration,
}

impl Pacing {
    /// No pauses at all; used with static snapshots.
    pub fn none() -> Self {
        Self {
            settle: Duration::ZERO,
            navigation: Duration::ZERO,
            click: Duration::ZERO,
            extract: Duration::ZERO,
            dismiss: Duration::ZERO,
            scroll: Duration::ZERO,
            key: Duration::ZERO,
            lazy_load: Duration::ZERO,
            load_more_click: Duration::ZERO,
        }
    }
}

impl From<&PacingConfig> for Pacing {
    fn from(c: &PacingConfig) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            navigation: Duration::from_millis(c.navigation_ms),
            click: Duration::from_millis(c.click_ms),
            extract: Duration::from_millis(c.extract_ms),
            dismiss: Duration::from_millis(c.dismiss_ms),
            scroll: Duration::from_millis(c.scroll_ms),
            key: Duration::from_millis(c.key_ms),
            lazy_load: Duration::from_millis(c.lazy_load_ms),
            load_more_click: Duration::from_millis(c.load_more_click_ms),
        }
    }
}

/// Listing traversal thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationConfig {
    /// Repeated elements required to choose click-and-collect
    pub min_list_items: usize,
    /// Consecutive load-more misses before the click loop stops
    pub max_load_more_attempts: usize,
    /// End/PageDown presses per load-more pass
    pub key_presses: usize,
}

/// Selector cascades, one ordered list per concern
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorsConfig {
    pub cookie_consent: Vec<String>,
    pub company_links: Vec<String>,
    pub items: Vec<String>,
    pub load_more: Vec<String>,
    pub close_overlay: Vec<String>,
    pub name: Vec<String>,
    pub logo: Vec<String>,
    pub description: Vec<String>,
    pub phone: Vec<String>,
    pub email: Vec<String>,
    pub contact: Vec<String>,
    pub website: Vec<String>,
    pub social_containers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternsConfig {
    /// Lower-case substrings marking navigation/utility links
    pub skip: Vec<String>,
    /// Regexes identifying detail-page URLs
    pub detail: Vec<String>,
    pub phone: Vec<String>,
    pub email: String,
    /// Website hrefs containing these belong to the directory itself
    pub self_reference_markers: Vec<String>,
    /// Reject website candidates on the page's own host (ignoring `www.`)
    #[serde(default = "default_true")]
    pub reject_same_host_websites: bool,
    pub scroll_scripts: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    pub domains: Vec<String>,
    pub patterns: Vec<String>,
    pub facebook: Vec<String>,
    pub instagram: Vec<String>,
    pub linkedin: Vec<String>,
    pub twitter: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default configuration
    pub fn from_default() -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the default path, falling back
    /// to the embedded defaults when the default file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => match Self::load() {
                Err(ConfigError::FileNotFound(missing)) => {
                    info!(
                        "No configuration at {}, using built-in defaults (run --init to write them)",
                        missing.display()
                    );
                    Self::from_default()
                }
                other => other,
            },
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browser.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "browser.user_agent".to_string(),
            });
        }
        if self.browser.timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "browser.timeout_secs".to_string(),
            });
        }
        if self.navigation.min_list_items == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "navigation.min_list_items".to_string(),
            });
        }
        if self.navigation.max_load_more_attempts == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "navigation.max_load_more_attempts".to_string(),
            });
        }

        let s = &self.selectors;
        let required = [
            ("selectors.company_links", &s.company_links),
            ("selectors.items", &s.items),
            ("selectors.close_overlay", &s.close_overlay),
            ("selectors.name", &s.name),
            ("selectors.website", &s.website),
            ("patterns.detail", &self.patterns.detail),
            ("patterns.phone", &self.patterns.phone),
        ];
        for (field, list) in required {
            if list.is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: field.to_string(),
                });
            }
        }

        for (i, pattern) in self.patterns.detail.iter().enumerate() {
            validate_regex(&format!("patterns.detail[{}]", i), pattern)?;
        }
        for (i, pattern) in self.patterns.phone.iter().enumerate() {
            validate_regex(&format!("patterns.phone[{}]", i), pattern)?;
        }
        validate_regex("patterns.email", &self.patterns.email)?;
        for (i, pattern) in self.social.patterns.iter().enumerate() {
            validate_regex(&format!("social.patterns[{}]", i), pattern)?;
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    /// Create default configuration file at `path`
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Never clobber an edited configuration
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

fn validate_regex(name: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern_name: name.to_string(),
        pattern: pattern.to_string(),
        error: e.to_string(),
    })
}

fn compile_all(name: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| validate_regex(&format!("{}[{}]", name, i), p))
        .collect()
}

/// Configuration compiled for the scraping pipeline: selector entries parsed
/// into rules and every pattern compiled once.
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub pacing: Pacing,
    pub min_list_items: usize,
    pub max_load_more_attempts: usize,
    pub key_presses: usize,

    pub cookie_consent: Vec<String>,
    pub company_links: Vec<String>,
    pub items: Vec<String>,
    pub load_more: Vec<String>,
    pub close_overlay: Vec<String>,
    pub social_containers: Vec<String>,

    pub name: Vec<SelectorRule>,
    pub logo: Vec<SelectorRule>,
    pub description: Vec<SelectorRule>,
    pub phone: Vec<SelectorRule>,
    pub email: Vec<SelectorRule>,
    pub contact: Vec<SelectorRule>,
    pub website: Vec<SelectorRule>,

    pub skip_patterns: Vec<String>,
    pub detail_patterns: Vec<Regex>,
    pub self_reference_markers: Vec<String>,
    pub reject_same_host_websites: bool,
    pub scroll_scripts: Vec<String>,

    pub contact_patterns: ContactPatterns,
    pub social: SocialClassifier,
}

impl Heuristics {
    pub fn compile(config: &AppConfig) -> Result<Self, ConfigError> {
        let s = &config.selectors;
        let p = &config.patterns;

        let contact_patterns = ContactPatterns::new(
            compile_all("patterns.phone", &p.phone)?,
            validate_regex("patterns.email", &p.email)?,
        );
        let social = SocialClassifier::new(
            config.social.domains.clone(),
            compile_all("social.patterns", &config.social.patterns)?,
            PlatformFamilies {
                facebook: config.social.facebook.clone(),
                instagram: config.social.instagram.clone(),
                linkedin: config.social.linkedin.clone(),
                twitter: config.social.twitter.clone(),
            },
        );

        Ok(Self {
            pacing: Pacing::from(&config.pacing),
            min_list_items: config.navigation.min_list_items,
            max_load_more_attempts: config.navigation.max_load_more_attempts,
            key_presses: config.navigation.key_presses,

            cookie_consent: s.cookie_consent.clone(),
            company_links: s.company_links.clone(),
            items: s.items.clone(),
            load_more: s.load_more.clone(),
            close_overlay: s.close_overlay.clone(),
            social_containers: s.social_containers.clone(),

            name: parse_rules(&s.name),
            logo: parse_rules_with_default(&s.logo, "src"),
            description: parse_rules(&s.description),
            phone: parse_rules(&s.phone),
            email: parse_rules(&s.email),
            contact: parse_rules(&s.contact),
            website: parse_rules_with_default(&s.website, "href"),

            skip_patterns: p.skip.iter().map(|s| s.to_lowercase()).collect(),
            detail_patterns: compile_all("patterns.detail", &p.detail)?,
            self_reference_markers: p
                .self_reference_markers
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            reject_same_host_websites: p.reject_same_host_websites,
            scroll_scripts: p.scroll_scripts.clone(),

            contact_patterns,
            social,
        })
    }

    /// Same tables with every pause removed.
    pub fn without_pauses(mut self) -> Self {
        self.pacing = Pacing::none();
        self
    }
}
