//! Shared fixtures for the integration tests
//!
//! A mock site serves static-pagination listings under `/{module}/` and
//! detail pages under `/{module}/202401/`.

#![allow(dead_code)]

use chrono::Utc;
use policy_harvest::config::{parse_config, Config};
use policy_harvest::storage::{ArchiveRecord, SqliteStorage, Storage};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PAGE_SIZE: u32 = 10;

/// Per-module settings for [`test_config`]
pub struct ModuleSpec<'a> {
    pub id: &'a str,
    pub stop_threshold: u32,
    pub mode: &'a str,
}

impl<'a> ModuleSpec<'a> {
    pub fn new(id: &'a str) -> Self {
        Self {
            id,
            stop_threshold: 20,
            mode: "incremental",
        }
    }

    pub fn threshold(mut self, k: u32) -> Self {
        self.stop_threshold = k;
        self
    }
}

/// Builds a validated config pointing at the mock server and a temp data dir
///
/// Delays are zero so tests run fast; `retry_times` is the attempt budget.
pub fn test_config(server_uri: &str, data_dir: &Path, modules: &[ModuleSpec], retry_times: u32) -> Config {
    let mut toml = format!(
        r#"
[fetch]
retry-times = {retry_times}
retry-delay-ms = [0, 0]
request-delay-ms = [0, 0]
max-file-size = 1024

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
data-dir = '{data}'
database-path = '{data}/harvest.db'
"#,
        retry_times = retry_times,
        data = data_dir.display()
    );

    for module in modules {
        toml.push_str(&format!(
            r#"
[[module]]
id = "{id}"
listing-url = "{uri}/{id}/"
pagination = "static"
stop-threshold = {k}
mode = "{mode}"
"#,
            id = module.id,
            uri = server_uri,
            k = module.stop_threshold,
            mode = module.mode
        ));
    }

    parse_config(&toml).unwrap()
}

pub fn doc_id(n: u32) -> String {
    format!("t{:03}", n)
}

pub fn doc_title(n: u32) -> String {
    format!("关于第{}号事项的通知", n)
}

/// URL path of page `page` of a static listing
pub fn listing_path(module: &str, page: u32) -> String {
    if page == 1 {
        format!("/{}/index.html", module)
    } else {
        format!("/{}/index_{}.html", module, page - 1)
    }
}

pub fn detail_path(module: &str, n: u32) -> String {
    format!("/{}/202401/{}.html", module, doc_id(n))
}

/// Listing page HTML for the given document numbers
///
/// Declares the total record count so the walker knows where the listing
/// ends.
pub fn listing_html(module: &str, docs: &[u32], total_docs: u32) -> String {
    let mut html = String::from("<html><body><ul class=\"list\">\n");
    for &n in docs {
        html.push_str(&format!(
            "<li><a href=\"{}\" title=\"{}\">{}</a><span>2024-01-05</span></li>\n",
            detail_path(module, n),
            doc_title(n),
            doc_title(n)
        ));
    }
    html.push_str("</ul>\n");
    html.push_str(&format!(
        "<script>var recordCount = {}; var pageSize = {};</script>\n",
        total_docs, PAGE_SIZE
    ));
    html.push_str("<div class=\"footer\"><li><a href=\"/sitemap.html\">网站地图</a></li></div>\n");
    html.push_str("</body></html>");
    html
}

pub fn detail_html(title: &str, pdf_href: Option<&str>) -> String {
    let pdf = pdf_href
        .map(|href| format!("<p><a href=\"{}\">附件</a></p>", href))
        .unwrap_or_default();
    format!(
        "<html><head><title>{title}</title></head><body><h1>{title}</h1>\
         <div class=\"trs_editor_view\"><p>正文内容。</p>{pdf}</div></body></html>",
        title = title,
        pdf = pdf
    )
}

/// Mounts a paginated listing of documents `1..=total` for `module`
pub async fn mount_listing(server: &MockServer, module: &str, total: u32) {
    let pages = (total + PAGE_SIZE - 1) / PAGE_SIZE;
    for page in 1..=pages {
        let first = (page - 1) * PAGE_SIZE + 1;
        let last = (page * PAGE_SIZE).min(total);
        let docs: Vec<u32> = (first..=last).collect();
        Mock::given(method("GET"))
            .and(path(listing_path(module, page)))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(module, &docs, total)))
            .mount(server)
            .await;
    }
}

/// Mounts the detail page of document `n`, expecting `expected` requests
pub async fn mount_detail(server: &MockServer, module: &str, n: u32, expected: u64) {
    Mock::given(method("GET"))
        .and(path(detail_path(module, n)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(&doc_title(n), None)))
        .expect(expected)
        .mount(server)
        .await;
}

/// Number of requests the server saw for `request_path`
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

/// Marks documents as archived by an earlier run
pub fn seed_known(db_path: &Path, module: &str, docs: impl IntoIterator<Item = u32>) {
    let mut storage = SqliteStorage::new(db_path).unwrap();
    for n in docs {
        storage
            .commit_archive(&ArchiveRecord {
                module_id: module.to_string(),
                doc_id: doc_id(n),
                title: doc_title(n),
                publish_date: Some("2024-01-05".to_string()),
                source_url: format!("http://example.org{}", detail_path(module, n)),
                local_html_path: format!("{}/2024-01-05_{}.html", module, doc_title(n)),
                local_pdf_path: None,
                doc_number: None,
                department: None,
                asset_note: None,
                fetched_at: Utc::now(),
            })
            .unwrap();
    }
}
