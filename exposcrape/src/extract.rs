//! Entity extraction from a reachable detail surface.
//!
//! Each field runs its own selector cascade; a miss leaves the field absent and
//! never fails the record. Only losing access to the surface itself is an error.

use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::cascade::{first_match, first_success, SelectorRule};
use crate::config::Heuristics;
use crate::contact::{email_from_href, phone_from_href};
use crate::record::EntityRecord;
use crate::surface::Surface;
use crate::url_utils::normalize_url;

const MIN_NAME_LEN: usize = 2;
const MIN_DESCRIPTION_LEN: usize = 11;

/// Hrefs that can never be a company website.
const NON_WEB_PREFIXES: &[&str] = &["mailto:", "tel:", "javascript:", "#"];

pub struct EntityExtractor {
    heuristics: Arc<Heuristics>,
}

impl EntityExtractor {
    pub fn new(heuristics: Arc<Heuristics>) -> Self {
        Self { heuristics }
    }

    /// Build one record from whatever the surface currently shows, tagged with
    /// `source_url`.
    pub fn extract(&self, surface: &dyn Surface, source_url: &str) -> Result<EntityRecord> {
        surface.wait(self.heuristics.pacing.extract);
        let page_url = surface.current_url()?;
        let h = &self.heuristics;

        let mut record = EntityRecord::new(source_url);
        record.name = first_match(surface, &h.name, |v| v.chars().count() >= MIN_NAME_LEN);
        record.logo_url = self.extract_logo(surface, &page_url);
        record.description = first_match(surface, &h.description, |v| {
            v.chars().count() >= MIN_DESCRIPTION_LEN
        });
        record.phone = self.contact_field(surface, &h.phone, phone_from_href, |text| {
            h.contact_patterns.extract_phone(text)
        });
        record.email = self.contact_field(surface, &h.email, email_from_href, |text| {
            h.contact_patterns.extract_email(text)
        });
        record.website_url = self.extract_website(surface, &page_url);
        record.socials = self.extract_socials(surface, &page_url);

        debug!(
            name = record.display_name(),
            has_website = record.website_url.is_some(),
            socials = record.socials.len(),
            "Extracted entity from {}",
            page_url
        );
        Ok(record)
    }

    fn extract_logo(&self, surface: &dyn Surface, page_url: &str) -> Option<String> {
        first_success(&self.heuristics.logo, |rule| {
            Ok(rule
                .read(surface, 0)?
                .and_then(|src| normalize_url(&src, page_url)))
        })
    }

    /// Field selectors first, reading the href scheme before the element
    /// text; then the text of the generic contact blocks.
    fn contact_field<H, T>(
        &self,
        surface: &dyn Surface,
        rules: &[SelectorRule],
        from_href: H,
        from_text: T,
    ) -> Option<String>
    where
        H: Fn(&str) -> Option<String>,
        T: Fn(&str) -> Option<String>,
    {
        let from_field = first_success(rules, |rule| {
            if let Some(value) = surface
                .attribute(&rule.selector, 0, "href")?
                .and_then(|href| from_href(&href))
            {
                return Ok(Some(value));
            }
            Ok(surface
                .inner_text(&rule.selector, 0)?
                .and_then(|text| from_text(&text)))
        });
        if from_field.is_some() {
            return from_field;
        }

        first_success(&self.heuristics.contact, |rule| {
            Ok(surface
                .inner_text(&rule.selector, 0)?
                .and_then(|text| from_text(&text)))
        })
    }

    /// First external link that is not the directory itself, the current
    /// page, a parent of the current page, or a social profile.
    fn extract_website(&self, surface: &dyn Surface, page_url: &str) -> Option<String> {
        let page_host = host_of(page_url);
        first_success(&self.heuristics.website, |rule| {
            let count = surface.count(&rule.selector)?;
            for index in 0..count {
                let Some(raw) = rule.read(surface, index)? else {
                    continue;
                };
                let lower = raw.to_lowercase();
                if NON_WEB_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                    continue;
                }
                let Some(url) = normalize_url(&raw, page_url) else {
                    continue;
                };
                if self.is_website_candidate(&url, page_url, page_host.as_deref()) {
                    return Ok(Some(url));
                }
            }
            Ok(None)
        })
    }

    fn is_website_candidate(&self, url: &str, page_url: &str, page_host: Option<&str>) -> bool {
        let lower = url.to_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return false;
        }
        if self
            .heuristics
            .self_reference_markers
            .iter()
            .any(|m| lower.contains(m.as_str()))
        {
            return false;
        }
        if url == page_url || page_url.starts_with(url) {
            return false;
        }
        if self.heuristics.social.is_social(url) {
            return false;
        }
        if !self.heuristics.reject_same_host_websites {
            return true;
        }
        match (page_host, host_of(url)) {
            (Some(page), Some(host)) => page != host,
            _ => true,
        }
    }

    /// Every social anchor on the surface, plus those inside the configured
    /// social containers, normalized and collapsed into a set.
    fn extract_socials(&self, surface: &dyn Surface, page_url: &str) -> BTreeSet<String> {
        let mut socials = BTreeSet::new();
        let selectors = std::iter::once("a[href]".to_string()).chain(
            self.heuristics
                .social_containers
                .iter()
                .map(|container| format!("{} a[href]", container)),
        );

        for selector in selectors {
            if let Err(e) = self.collect_social_links(surface, &selector, page_url, &mut socials) {
                debug!(selector = %selector, "Social scan failed: {}", e);
            }
        }
        socials
    }

    fn collect_social_links(
        &self,
        surface: &dyn Surface,
        selector: &str,
        page_url: &str,
        socials: &mut BTreeSet<String>,
    ) -> Result<()> {
        let count = surface.count(selector)?;
        for index in 0..count {
            let Some(href) = surface.attribute(selector, index, "href")? else {
                continue;
            };
            if let Some(url) = normalize_url(&href, page_url) {
                if self.heuristics.social.is_social(&url) {
                    socials.insert(url);
                }
            }
        }
        Ok(())
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::surface::HtmlSurface;

    fn extractor() -> EntityExtractor {
        let config = AppConfig::from_default().unwrap();
        let heuristics = Heuristics::compile(&config).unwrap().without_pauses();
        EntityExtractor::new(Arc::new(heuristics))
    }

    const DETAIL_URL: &str = "https://fair.test/exhibitors/acme";

    const DETAIL: &str = r#"
        <html>
        <head>
            <title>Acme Corp | Fair 2025</title>
            <meta name="description" content="Acme builds industrial widgets since 1950.">
        </head>
        <body>
            <nav><a href="https://fair.test/">Home</a><a href="https://fair.test/exhibitors">All</a></nav>
            <h1>Acme Corp</h1>
            <div class="company-logo"><img src="/media/acme.png"></div>
            <div class="contact">
                <a href="tel:+39 06 1234 5678">Call</a>
                <a href="mailto:info@acme.test?subject=Fair">Write</a>
            </div>
            <a href="https://expo-platform.test/acme" target="_blank">Booth map</a>
            <a href="https://www.linkedin.com/company/acme" target="_blank">LinkedIn</a>
            <a href="https://acme.test" target="_blank">acme.test</a>
            <div class="social-links">
                <a href="//facebook.com/acme">fb</a>
                <a href="https://x.com/acme">x</a>
            </div>
        </body>
        </html>
    "#;

    fn surface_for(html: &str) -> HtmlSurface {
        let surface = HtmlSurface::single(DETAIL_URL, html);
        surface.navigate(DETAIL_URL).unwrap();
        surface
    }

    #[test]
    fn test_extract_full_record() {
        let surface = surface_for(DETAIL);
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();

        assert_eq!(record.name.as_deref(), Some("Acme Corp"));
        assert_eq!(record.logo_url.as_deref(), Some("https://fair.test/media/acme.png"));
        assert_eq!(
            record.description.as_deref(),
            Some("Acme builds industrial widgets since 1950.")
        );
        assert_eq!(record.phone.as_deref(), Some("+39 06 1234 5678"));
        assert_eq!(record.email.as_deref(), Some("info@acme.test"));
        assert_eq!(record.website_url.as_deref(), Some("https://acme.test"));
        assert_eq!(record.source_url, DETAIL_URL);

        let socials: Vec<&str> = record.socials.iter().map(String::as_str).collect();
        assert_eq!(
            socials,
            vec![
                "https://facebook.com/acme",
                "https://www.linkedin.com/company/acme",
                "https://x.com/acme",
            ]
        );
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let surface = surface_for("<html><body><p>x</p></body></html>");
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();

        assert_eq!(record.name, None);
        assert_eq!(record.description, None);
        assert_eq!(record.phone, None);
        assert_eq!(record.email, None);
        assert_eq!(record.website_url, None);
        assert!(record.socials.is_empty());
        assert_eq!(record.source_url, DETAIL_URL);
    }

    #[test]
    fn test_contact_text_fallback() {
        let html = r#"
            <h1>Globex</h1>
            <div class="contact">Phone: (555) 123-4567 - Email: sales@globex.test</div>
        "#;
        let surface = surface_for(html);
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();
        assert_eq!(record.phone.as_deref(), Some("(555) 123-4567"));
        assert_eq!(record.email.as_deref(), Some("sales@globex.test"));
    }

    #[test]
    fn test_short_name_and_description_rejected() {
        let html = r#"
            <h1>A</h1>
            <h2>Initech</h2>
            <div class="company-description">Too short</div>
            <meta name="description" content="Initech makes TPS report software.">
        "#;
        let surface = surface_for(html);
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();
        assert_eq!(record.name.as_deref(), Some("Initech"));
        assert_eq!(
            record.description.as_deref(),
            Some("Initech makes TPS report software.")
        );
    }

    #[test]
    fn test_same_host_website_toggle() {
        let html = r#"
            <h1>Hooli</h1>
            <a href="https://www.fair.test/partners/hooli" target="_blank">Partner page</a>
        "#;
        let surface = surface_for(html);
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();
        assert_eq!(record.website_url, None);

        let mut config = AppConfig::from_default().unwrap();
        config.patterns.reject_same_host_websites = false;
        let heuristics = Heuristics::compile(&config).unwrap().without_pauses();
        let record = EntityExtractor::new(Arc::new(heuristics))
            .extract(&surface, DETAIL_URL)
            .unwrap();
        assert_eq!(
            record.website_url.as_deref(),
            Some("https://www.fair.test/partners/hooli")
        );
    }

    /// Regression: non-ASCII hrefs in the contact cascades leave the field
    /// absent instead of panicking
    #[test]
    fn test_non_ascii_contact_hrefs() {
        let html = r#"
            <h1>Acme</h1>
            <a class="phone-link" href="日本語">電話</a>
            <a class="mail-us" href="お問い合わせ.html">お問い合わせ</a>
        "#;
        let surface = surface_for(html);
        let record = extractor().extract(&surface, DETAIL_URL).unwrap();
        assert_eq!(record.name.as_deref(), Some("Acme"));
        assert_eq!(record.phone, None);
        assert_eq!(record.email, None);
    }

    #[test]
    fn test_surface_loss_is_an_error() {
        let surface = HtmlSurface::new();
        assert!(extractor().extract(&surface, DETAIL_URL).is_err());
    }
}
