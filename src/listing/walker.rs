use crate::config::ModuleConfig;
use crate::fetch::{FetchKind, Fetcher};
use crate::listing::{detect_total_pages, page_url, parse_listing, DocumentReference};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use url::Url;

/// Why a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// Every page of the listing was visited
    Exhausted,
    /// The configured page cap was reached
    PageLimit,
    /// A page could not be fetched or yielded no rows
    Halted { page: u32, cause: String },
    /// The caller stopped the walk
    Stopped,
}

impl fmt::Display for WalkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("listing exhausted"),
            Self::PageLimit => f.write_str("page limit reached"),
            Self::Halted { page, cause } => write!(f, "halted at page {}: {}", page, cause),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Lazy iterator over a module's listing
///
/// Pages are fetched on demand as [`next`](Self::next) drains the buffered
/// rows of the previous page. A document id is yielded at most once per walk.
pub struct ListingWalker<'a> {
    module: &'a ModuleConfig,
    fetcher: &'a Fetcher,
    start_page: u32,
    next_page: u32,
    /// Last page the walk may visit (inclusive)
    page_cap: Option<u32>,
    total_pages: Option<u32>,
    link_base: Option<Url>,
    buffer: VecDeque<DocumentReference>,
    seen: HashSet<String>,
    pages_fetched: u32,
    last_page_reached: u32,
    end: Option<WalkEnd>,
}

impl<'a> ListingWalker<'a> {
    /// Starts a walk at `start_page` (1-based)
    ///
    /// `max_pages` bounds how many pages this walk may fetch, counting from
    /// the start page.
    pub fn new(
        module: &'a ModuleConfig,
        fetcher: &'a Fetcher,
        start_page: u32,
        max_pages: Option<u32>,
    ) -> Self {
        let start_page = start_page.max(1);
        let link_base = module
            .link_base
            .as_deref()
            .and_then(|base| Url::parse(base).ok());

        Self {
            module,
            fetcher,
            start_page,
            next_page: start_page,
            page_cap: max_pages.map(|max| start_page.saturating_add(max.saturating_sub(1))),
            total_pages: None,
            link_base,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            pages_fetched: 0,
            last_page_reached: 0,
            end: None,
        }
    }

    /// Yields the next reference, fetching listing pages as needed
    ///
    /// Returns `None` once the walk has ended; [`end`](Self::end) tells why.
    pub async fn next(&mut self) -> Option<DocumentReference> {
        loop {
            if let Some(reference) = self.buffer.pop_front() {
                return Some(reference);
            }
            if self.end.is_some() {
                return None;
            }
            self.load_next_page().await;
        }
    }

    /// Ends the walk; buffered rows are discarded and no further page is
    /// fetched
    pub fn stop(&mut self) {
        self.buffer.clear();
        if self.end.is_none() {
            self.end = Some(WalkEnd::Stopped);
        }
    }

    pub fn end(&self) -> Option<&WalkEnd> {
        self.end.as_ref()
    }

    /// Highest page whose rows were parsed, or 0 if none
    pub fn last_page_reached(&self) -> u32 {
        self.last_page_reached
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn start_page(&self) -> u32 {
        self.start_page
    }

    /// Page the walk would fetch next
    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    async fn load_next_page(&mut self) {
        let page = self.next_page;
        let module = self.module;
        let module_id = module.id.as_str();

        if let Some(total) = self.total_pages {
            if page > total {
                self.end = Some(WalkEnd::Exhausted);
                return;
            }
        }
        if let Some(cap) = self.page_cap {
            if page > cap {
                tracing::info!("{}: page limit {} reached", module_id, cap);
                self.end = Some(WalkEnd::PageLimit);
                return;
            }
        }

        let url = match page_url(module, page) {
            Ok(url) => url,
            Err(e) => {
                self.halt(page, format!("invalid listing URL: {}", e));
                return;
            }
        };

        let response = match self.fetcher.fetch(url.as_str(), FetchKind::ListingPage).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() && page > self.start_page && self.total_pages.is_none() => {
                tracing::info!("{}: page {} not found, end of listing", module_id, page);
                self.end = Some(WalkEnd::Exhausted);
                return;
            }
            Err(e) => {
                self.halt(page, e.to_string());
                return;
            }
        };

        let html = response.text().unwrap_or_default();
        if self.total_pages.is_none() {
            self.total_pages = detect_total_pages(html, module.pagination);
        }

        let base = self
            .link_base
            .clone()
            .unwrap_or_else(|| response.final_url.clone());
        let rows = parse_listing(html, &base, module_id, page);

        self.pages_fetched += 1;
        self.last_page_reached = page;
        self.next_page = page.saturating_add(1);

        tracing::info!(
            "{}: page {}/{} parsed {} references",
            module_id,
            page,
            self.total_pages
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string()),
            rows.len()
        );

        if rows.is_empty() {
            if page == self.start_page || self.total_pages.is_some() {
                self.halt(page, "no document rows on page".to_string());
            } else {
                self.end = Some(WalkEnd::Exhausted);
            }
            return;
        }

        let mut fresh = 0;
        for row in rows {
            if self.seen.insert(row.doc_id.clone()) {
                self.buffer.push_back(row);
                fresh += 1;
            }
        }

        // Some sites serve the last page again for any index past the end
        if fresh == 0 && self.total_pages.is_none() {
            tracing::debug!("{}: page {} repeats earlier rows", module_id, page);
            self.end = Some(WalkEnd::Exhausted);
        }
    }

    fn halt(&mut self, page: u32, cause: String) {
        tracing::warn!("{}: pagination halted at page {}: {}", self.module.id, page, cause);
        self.end = Some(WalkEnd::Halted { page, cause });
    }
}
