use url::Url;

use crate::Error;

/// Validates that the input string is a URL.
pub fn is_valid_url(url: &str) -> Result<Url, Error> {
    let valid_url = Url::parse(url)?;
    Ok(valid_url)
}

/// Lowercase host of a hostname or URL, without scheme, port, path or trailing dot.
pub fn normalize_hostname(input: &str) -> Result<String, Error> {
    let trimmed = input.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme)?;
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidHostname(input.to_string()))?;
    Ok(host)
}

/// The URL a crawl of the domain starts from.
pub fn site_url(hostname: &str) -> String {
    format!("https://{}", hostname)
}

/// Canonical form of a crawled page's URL: parsed, with the fragment removed.
/// Unparseable input is returned trimmed.
pub fn normalize_page_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}
