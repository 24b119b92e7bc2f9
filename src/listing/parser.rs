//! Listing page row extraction
//!
//! A listing row is any `<li>` whose first link points at an `.html`/`.htm`
//! detail page. Navigation boilerplate that happens to match is filtered by
//! title.

use crate::listing::DocumentReference;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use url::Url;

/// Footer links that look like rows on every listing page
const BOILERPLATE_TITLES: &[&str] = &["网站声明", "网站地图", "联系我们"];

lazy_static! {
    static ref FULL_DATE: Regex = Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap();
    static ref URL_MONTH: Regex = Regex::new(r"/(\d{4})(\d{2})/").unwrap();
}

/// Parses one listing page into document references
///
/// `base_url` resolves relative row links. Rows are returned in page order;
/// duplicates within the page are kept for the caller to drop.
pub fn parse_listing(
    html: &str,
    base_url: &Url,
    module_id: &str,
    page: u32,
) -> Vec<DocumentReference> {
    let document = Html::parse_document(html);
    let (Ok(li_selector), Ok(a_selector), Ok(span_selector)) = (
        Selector::parse("li"),
        Selector::parse("a"),
        Selector::parse("span"),
    ) else {
        return Vec::new();
    };

    let mut refs = Vec::new();

    for li in document.select(&li_selector) {
        let Some(link) = li.select(&a_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(detail_url) = resolve_detail_link(href, base_url) else {
            continue;
        };

        let title = link
            .value()
            .attr("title")
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| clean_text(&link.text().collect::<String>()));
        if title.is_empty() || BOILERPLATE_TITLES.contains(&title.as_str()) {
            continue;
        }

        let publish_date = extract_date(&li, &span_selector, &detail_url);
        let doc_id = doc_id_from_url(&detail_url);

        refs.push(DocumentReference {
            module_id: module_id.to_string(),
            doc_id,
            title,
            detail_url: detail_url.to_string(),
            publish_date,
            listing_page_index: page,
        });
    }

    refs
}

/// Resolves a row href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}

/// Keeps only links to `.html`/`.htm` detail pages
fn resolve_detail_link(href: &str, base_url: &Url) -> Option<Url> {
    let absolute = resolve_link(href, base_url)?;
    let path = absolute.path().to_ascii_lowercase();
    if path.ends_with(".html") || path.ends_with(".htm") {
        Some(absolute)
    } else {
        None
    }
}

/// Publish date from a `<span>`, the row text, or a `/YYYYMM/` URL segment
fn extract_date(li: &ElementRef<'_>, span_selector: &Selector, url: &Url) -> Option<String> {
    for span in li.select(span_selector) {
        let text = span.text().collect::<String>();
        if let Some(m) = FULL_DATE.find(&text) {
            return Some(m.as_str().to_string());
        }
    }

    let text = li.text().collect::<String>();
    if let Some(m) = FULL_DATE.find(&text) {
        return Some(m.as_str().to_string());
    }

    URL_MONTH
        .captures(url.path())
        .map(|caps| format!("{}-{}-00", &caps[1], &caps[2]))
}

/// Derives the stable document id from a detail URL
///
/// The id is the final path segment without its extension
/// (`t20240105_1097467`). URLs without a usable segment fall back to the
/// first 16 hex characters of the URL's SHA-256.
pub fn doc_id_from_url(url: &Url) -> String {
    let stem = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| match segment.rfind('.') {
            Some(idx) => &segment[..idx],
            None => segment,
        })
        .filter(|stem| !stem.is_empty() && !stem.eq_ignore_ascii_case("index"));

    match stem {
        Some(stem) => stem.to_string(),
        None => {
            let digest = Sha256::digest(url.as_str().as_bytes());
            hex::encode(digest)[..16].to_string()
        }
    }
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
