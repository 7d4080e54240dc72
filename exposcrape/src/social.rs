//! Social-platform link detection and categorisation.

use regex::Regex;
use url::Url;

use crate::record::SocialSlots;

/// The platforms that get a dedicated column, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Facebook,
    Instagram,
    Linkedin,
    Twitter,
}

impl Platform {
    pub const PRIORITY: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
    ];
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Facebook => write!(f, "facebook"),
            Platform::Instagram => write!(f, "instagram"),
            Platform::Linkedin => write!(f, "linkedin"),
            Platform::Twitter => write!(f, "twitter"),
        }
    }
}

/// Domain families for the four named platforms.
#[derive(Debug, Clone, Default)]
pub struct PlatformFamilies {
    pub facebook: Vec<String>,
    pub instagram: Vec<String>,
    pub linkedin: Vec<String>,
    pub twitter: Vec<String>,
}

impl PlatformFamilies {
    fn domains(&self, platform: Platform) -> &[String] {
        match platform {
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::Linkedin => &self.linkedin,
            Platform::Twitter => &self.twitter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SocialClassifier {
    domains: Vec<String>,
    patterns: Vec<Regex>,
    families: PlatformFamilies,
}

impl SocialClassifier {
    pub fn new(domains: Vec<String>, patterns: Vec<Regex>, families: PlatformFamilies) -> Self {
        Self {
            domains: domains.into_iter().map(|d| d.to_lowercase()).collect(),
            patterns,
            families,
        }
    }

    /// Whether `url` points at a social platform: a known social domain appears
    /// anywhere in it (case-insensitive), or one of the patterns matches.
    pub fn is_social(&self, url: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        let lower = url.to_lowercase();
        self.domains.iter().any(|d| lower.contains(d.as_str()))
            || self.patterns.iter().any(|p| p.is_match(&lower))
    }

    /// Named platform for `url`, testing families in [`Platform::PRIORITY`] order.
    ///
    /// Parsed URLs match on the host (exact or subdomain); anything that does
    /// not parse falls back to a substring test.
    pub fn platform_of(&self, url: &str) -> Option<Platform> {
        let lower = url.to_lowercase();
        let host = Url::parse(&lower)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        Platform::PRIORITY.into_iter().find(|platform| {
            let domains = self.families.domains(*platform);
            match &host {
                Some(host) => domains.iter().any(|d| {
                    let d = d.to_lowercase();
                    host == &d || host.ends_with(&format!(".{}", d))
                }),
                None => domains.iter().any(|d| lower.contains(&d.to_lowercase())),
            }
        })
    }

    /// Spread `urls` into the platform slots. The first URL seen for a platform
    /// wins; later ones for the same platform are dropped. Everything else goes
    /// to `other` in encounter order.
    pub fn categorize<'a, I>(&self, urls: I) -> SocialSlots
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut slots = SocialSlots::default();
        for url in urls {
            if url.trim().is_empty() {
                continue;
            }
            match self.platform_of(url) {
                Some(platform) => {
                    let slot = slots.slot_mut(platform);
                    if slot.is_none() {
                        *slot = Some(url.to_string());
                    }
                }
                None => slots.other.push(url.to_string()),
            }
        }
        slots
    }
}
