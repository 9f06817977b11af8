//! HTTP client for a Wikimedia dump host.
//!
//! A dump lives at `<base>/<lang>wiki/<date>/`; its index page links to the
//! archives. Multi-shard dumps publish `pages-articles<N>.xml-p<a>p<b>.bz2`
//! files, small wikis a single `pages-articles.xml.bz2`.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::config::DEFAULT_DUMP_URL;
use crate::contract::{DumpLister, Fetcher};
use crate::error::FetchError;
use crate::natsort::natural_cmp;

static RE_HREF: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct HttpDumpClient {
    client: Client,
    base_url: String,
}

impl Default for HttpDumpClient {
    fn default() -> Self {
        Self::new(DEFAULT_DUMP_URL)
    }
}

impl HttpDumpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string(); // avoid "//"
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Index page of one dump.
    pub fn dump_url(&self, language: &str, date: &str) -> String {
        format!("{}/{}wiki/{}", self.base_url, language, date)
    }

    pub fn archive_url(&self, language: &str, date: &str, name: &str) -> String {
        format!("{}/{}", self.dump_url(language, date), name)
    }
}

/// Shard archives of a multi-file dump, e.g.
/// `enwiki-latest-pages-articles1.xml-p1p41242.bz2`.
pub fn is_shard_archive(name: &str, language: &str, date: &str) -> bool {
    let Some(rest) = name.strip_prefix(&format!("{language}wiki-{date}-pages-articles")) else {
        return false;
    };
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    digits > 0 && rest[digits..].starts_with(".xml") && name.ends_with("bz2")
}

/// The single archive of a small dump.
pub fn is_single_archive(name: &str, language: &str, date: &str) -> bool {
    name == format!("{language}wiki-{date}-pages-articles.xml.bz2")
}

/// Distinct link targets of an HTML page, reduced to their last path segment.
pub fn hrefs(html: &str) -> Vec<String> {
    let re = RE_HREF.get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap());
    re.captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().rsplit('/').next().unwrap_or_default().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Archive names for a dump, naturally sorted and deduplicated.
///
/// Falls back to the single-archive name when no shards are listed.
pub fn select_archives(links: &[String], language: &str, date: &str) -> Vec<String> {
    let mut names: Vec<String> = links
        .iter()
        .filter(|n| is_shard_archive(n, language, date))
        .cloned()
        .collect();
    if names.is_empty() {
        names = links
            .iter()
            .filter(|n| is_single_archive(n, language, date))
            .cloned()
            .collect();
    }
    names.sort_by(|a, b| natural_cmp(a, b));
    names.dedup();
    names
}

#[async_trait]
impl DumpLister for HttpDumpClient {
    async fn list_archives(&self, language: &str, date: &str) -> Result<Vec<String>, FetchError> {
        let url = self.dump_url(language, date);
        info!(url = %url, "Fetching dump index");

        let resp = self.client.get(&url).send().await.map_err(|source| {
            error!(error = %source, url = %url, "Failed to reach dump host");
            FetchError::Transport {
                url: url.clone(),
                source,
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Dump host returned error");
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let archives = select_archives(&hrefs(&body), language, date);
        if archives.is_empty() {
            error!(url = %url, "No pages-articles archives listed");
            return Err(FetchError::NoArchives { url });
        }
        info!(url = %url, count = archives.len(), "Listed dump archives");
        Ok(archives)
    }
}

#[async_trait]
impl Fetcher for HttpDumpClient {
    async fn fetch(
        &self,
        language: &str,
        date: &str,
        name: &str,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let url = self.archive_url(language, date, name);
        debug!(url = %url, dest = %dest.display(), "Downloading archive");

        let transport = |source| FetchError::Transport {
            url: url.clone(),
            source,
        };
        let io = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut resp = self.client.get(&url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Archive download refused");
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await.map_err(io)?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(transport)? {
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;

        info!(url = %url, bytes = written, "Downloaded archive");
        Ok(written)
    }
}
