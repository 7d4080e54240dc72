use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;

use exposcrape::config::{AppConfig, Heuristics};
use exposcrape::surface::HtmlSurface;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn load_json_fixture<T: DeserializeOwned>(relative: &str) -> T {
    let content = load_fixture(relative);
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse JSON fixture {}: {}", relative, e))
}

/// Default heuristics with every pause removed.
pub fn test_heuristics() -> Arc<Heuristics> {
    let config = AppConfig::from_default().expect("default config loads");
    let heuristics = Heuristics::compile(&config).expect("default heuristics compile");
    Arc::new(heuristics.without_pauses())
}

pub const DIRECTORY_URL: &str = "https://fair.test/exhibitors";

/// Exhibitors linked from `exhibitor_listing.html`, as (name, slug).
pub const DIRECTORY_EXHIBITORS: [(&str, &str); 5] = [
    ("Acme Corp", "acme-corp"),
    ("Globex", "globex"),
    ("Initech", "initech"),
    ("Umbrella", "umbrella"),
    ("Hooli", "hooli"),
];

pub fn exhibitor_url(slug: &str) -> String {
    format!("{}/{}", DIRECTORY_URL, slug)
}

/// A minimal exhibitor detail page: name, phone and an external website at
/// `https://<slug>.test`.
pub fn exhibitor_page(name: &str, slug: &str) -> String {
    format!(
        r#"<html><body>
            <a href="/exhibitors">All exhibitors</a>
            <h1>{name}</h1>
            <p class="company-description">{name} exhibits in hall B, stand {len}.</p>
            <a href="tel:+39 06 5550 {len:04}">Call us</a>
            <a class="website" href="https://{slug}.test" target="_blank">Website</a>
            <a href="https://www.linkedin.com/company/{slug}">LinkedIn</a>
        </body></html>"#,
        name = name,
        slug = slug,
        len = name.len()
    )
}

/// The directory listing with every linked detail page available.
pub fn directory_surface() -> HtmlSurface {
    let surface = HtmlSurface::single(DIRECTORY_URL, load_fixture("exhibitor_listing.html"));
    for (name, slug) in DIRECTORY_EXHIBITORS {
        surface.insert_page(&exhibitor_url(slug), exhibitor_page(name, slug));
    }
    surface
}
