use crate::state::RunMode;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for policy-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

impl Config {
    /// Looks up a configured module by id
    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.id == id)
    }
}

/// Network retrieval behavior shared by every module
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per retrieval, including the first one
    #[serde(rename = "retry-times")]
    pub retry_times: u32,

    /// Backoff bounds between attempts `[base, cap]` (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: [u64; 2],

    /// Randomized delay range applied before every request (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: [u64; 2],

    /// Size cap for binary assets such as PDFs (bytes)
    #[serde(rename = "max-file-size")]
    pub max_file_size: u64,

    /// Encoding used for pages that do not declare a charset
    #[serde(rename = "page-encoding", default = "default_page_encoding")]
    pub page_encoding: String,

    #[serde(rename = "listing-timeout-secs", default = "default_page_timeout")]
    pub listing_timeout_secs: u64,

    #[serde(rename = "detail-timeout-secs", default = "default_page_timeout")]
    pub detail_timeout_secs: u64,

    #[serde(rename = "asset-timeout-secs", default = "default_asset_timeout")]
    pub asset_timeout_secs: u64,
}

fn default_page_encoding() -> String {
    "utf-8".to_string()
}

fn default_page_timeout() -> u64 {
    30
}

fn default_asset_timeout() -> u64 {
    120
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root of the archive: module directories, manifest and lock files
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Optional webhook delivery of newly archived documents
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(rename = "webhook-url")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "webhook".to_string()
}

/// How a module's listing pages are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    /// `index.html`, `index_1.html`, `index_2.html`, ...
    Static,
    /// A search endpoint taking a `page` query parameter
    Query,
}

/// One independently paginated section of the target site
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    /// Stable identifier; also the module's directory name in the archive
    pub id: String,

    /// Human-readable name shown in logs and summaries
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "listing-url")]
    pub listing_url: String,

    pub pagination: PaginationStrategy,

    /// Fixed query parameters for `query` pagination
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Base used to resolve relative document links, when it differs from
    /// the listing URL
    #[serde(rename = "link-base", default)]
    pub link_base: Option<String>,

    /// Consecutive known documents that end an incremental scan
    #[serde(rename = "stop-threshold", default = "default_stop_threshold")]
    pub stop_threshold: u32,

    /// Alternative stop rule: end the scan at the first document published
    /// before this date
    #[serde(rename = "stop-before", default)]
    pub stop_before: Option<NaiveDate>,

    /// Upper bound on listing pages walked per run
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Mode used when the run does not override it
    #[serde(default)]
    pub mode: RunMode,
}

impl ModuleConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn default_stop_threshold() -> u32 {
    20
}
