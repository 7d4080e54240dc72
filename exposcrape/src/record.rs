use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::social::Platform;

/// One scraped company/exhibitor.
///
/// Optional fields persist as empty strings, never as `null`; loading accepts
/// `""`, `null` or a missing key as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// 1-based position in acceptance order; 0 until accepted.
    #[serde(rename = "company_index", default)]
    pub index: usize,
    #[serde(default, with = "empty_as_none")]
    pub name: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub website_url: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub phone: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub email: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub socials: BTreeSet<String>,
}

impl EntityRecord {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Social links spread over the four named platform columns plus the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialSlots {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub other: Vec<String>,
}

impl SocialSlots {
    pub fn slot(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Facebook => self.facebook.as_deref(),
            Platform::Instagram => self.instagram.as_deref(),
            Platform::Linkedin => self.linkedin.as_deref(),
            Platform::Twitter => self.twitter.as_deref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, platform: Platform) -> &mut Option<String> {
        match platform {
            Platform::Facebook => &mut self.facebook,
            Platform::Instagram => &mut self.instagram,
            Platform::Linkedin => &mut self.linkedin,
            Platform::Twitter => &mut self.twitter,
        }
    }

    /// `other` joined for the `other_socials` column.
    pub fn other_joined(&self) -> String {
        self.other.join(" | ")
    }
}

mod empty_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
