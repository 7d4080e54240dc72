use url::Url;

/// Resolve a raw href/src value to an absolute URL against `base`.
///
/// Order matters: bare domains (`example.com/x`) are recognised before generic
/// relative resolution, otherwise they would be joined onto the base path.
pub fn normalize_url(raw: &str, base: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // Protocol-relative
    if raw.starts_with("//") {
        return Some(format!("https:{}", raw));
    }

    // Root-relative
    if raw.starts_with('/') {
        return Some(join(base, raw));
    }

    if !has_web_scheme(raw) {
        if raw.contains('.') && !raw.starts_with('.') {
            return Some(format!("https://{}", raw));
        }
        return Some(join(base, raw));
    }

    Some(raw.to_string())
}

/// `http://` or `https://`, in any letter case.
fn has_web_scheme(raw: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn join(base: &str, raw: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(raw))
        .map(String::from)
        .unwrap_or_else(|_| raw.to_string())
}

/// Filesystem-safe slug for a listing URL's site, e.g.
/// `https://www.expo.example.com/list` -> `expo_example_com`.
///
/// A leading `www.` is dropped, dots become underscores, and a non-default
/// port is appended.
pub fn site_slug(listing_url: &str) -> Option<String> {
    let parsed = Url::parse(listing_url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut slug = host.replace('.', "_");
    if let Some(port) = parsed.port() {
        slug.push('_');
        slug.push_str(&port.to_string());
    }

    let slug: String = slug
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}
