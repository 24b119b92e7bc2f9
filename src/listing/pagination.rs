//! Listing page addressing and total-page detection

use crate::config::{ModuleConfig, PaginationStrategy};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

lazy_static! {
    static ref RECORD_COUNT: Regex = Regex::new(r#"var\s+recordCount\s*=\s*"?(\d+)"#).unwrap();
    static ref PAGE_SIZE: Regex = Regex::new(r#"var\s+pageSize\s*=\s*"?(\d+)"#).unwrap();
    static ref PAGE_COUNTER: Regex = Regex::new(r"页数[：:]\s*\d+\s*/\s*(\d+)").unwrap();
    static ref STATIC_INDEX: Regex = Regex::new(r"index_(\d+)\.html?").unwrap();
    static ref QUERY_PAGE: Regex = Regex::new(r"[?&]page=(\d+)").unwrap();
}

/// Builds the URL of listing page `page` (1-based) for a module
pub fn page_url(module: &ModuleConfig, page: u32) -> Result<Url, url::ParseError> {
    match module.pagination {
        PaginationStrategy::Static => {
            let base = static_base(&module.listing_url)?;
            if page <= 1 {
                base.join("index.html")
            } else {
                base.join(&format!("index_{}.html", page - 1))
            }
        }
        PaginationStrategy::Query => {
            let mut url = Url::parse(&module.listing_url)?;
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &module.params {
                    pairs.append_pair(key, value);
                }
                if page > 1 {
                    pairs.append_pair("page", &page.to_string());
                }
            }
            // An empty query string would still leave a trailing '?'
            if url.query() == Some("") {
                url.set_query(None);
            }
            Ok(url)
        }
    }
}

/// Directory URL of a static listing, tolerating a configured `index.html`
fn static_base(listing_url: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(listing_url)?;
    let path = url.path().to_string();
    let dir = match path.rfind('/') {
        Some(idx) if path[idx + 1..].contains('.') => path[..=idx].to_string(),
        _ if path.ends_with('/') => path,
        _ => format!("{}/", path),
    };
    url.set_path(&dir);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Reads the total page count advertised by a listing page
///
/// Tries, in order: the `recordCount`/`pageSize` script variables, a
/// `页数：a/b` counter, and the href of the `末页` ("last page") link.
/// Returns `None` when the page gives no usable hint.
pub fn detect_total_pages(html: &str, strategy: PaginationStrategy) -> Option<u32> {
    if let (Some(count), Some(size)) = (
        capture_number(&RECORD_COUNT, html),
        capture_number(&PAGE_SIZE, html),
    ) {
        if size > 0 {
            return Some(count.div_ceil(size).max(1));
        }
    }

    if let Some(total) = capture_number(&PAGE_COUNTER, html) {
        if total > 0 {
            return Some(total);
        }
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let last_link = document
        .select(&selector)
        .find(|a| a.text().collect::<String>().contains("末页"))?;
    let href = last_link.value().attr("href")?;

    match strategy {
        PaginationStrategy::Static => capture_number(&STATIC_INDEX, href).map(|n| n + 1),
        PaginationStrategy::Query => capture_number(&QUERY_PAGE, href).filter(|n| *n > 0),
    }
}

fn capture_number(pattern: &Regex, haystack: &str) -> Option<u32> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
