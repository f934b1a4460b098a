//! Rule loaders: static inline rules, local files, and HTTP(S) sources
//! with an on-disk fallback copy so a refresh outage does not wipe a
//! working blocklist.

use async_trait::async_trait;
use conduit_dns_application::ports::RuleLoader;
use conduit_dns_domain::ResolveError;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

pub struct StaticLoader {
    rules: Vec<String>,
}

impl StaticLoader {
    pub fn new(rules: Vec<String>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl RuleLoader for StaticLoader {
    fn source(&self) -> &str {
        "static"
    }

    async fn load(&self) -> Result<Vec<String>, ResolveError> {
        Ok(self.rules.clone())
    }
}

pub struct FileLoader {
    path: String,
}

impl FileLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleLoader for FileLoader {
    fn source(&self) -> &str {
        &self.path
    }

    async fn load(&self) -> Result<Vec<String>, ResolveError> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| ResolveError::ListLoad {
                    source_name: self.path.clone(),
                    reason: e.to_string(),
                })?;
        Ok(contents.lines().map(str::to_string).collect())
    }
}

static SHARED_HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("conduit-dns/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

pub struct HttpLoader {
    url: String,
    cache_dir: Option<PathBuf>,
}

impl HttpLoader {
    pub fn new(url: impl Into<String>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cache_dir,
        }
    }

    fn cache_path(&self) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        // One cache file per URL; everything non-alphanumeric collapses
        // to '_' so the URL is usable as a file name.
        let file: String = self
            .url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Some(dir.join(file))
    }

    async fn fetch(&self) -> Result<String, ResolveError> {
        let response = SHARED_HTTP_CLIENT
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ResolveError::ListLoad {
                source_name: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::ListLoad {
                source_name: self.url.clone(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        response.text().await.map_err(|e| ResolveError::ListLoad {
            source_name: self.url.clone(),
            reason: e.to_string(),
        })
    }

    async fn read_cache(&self) -> Option<String> {
        let path = self.cache_path()?;
        tokio::fs::read_to_string(&path).await.ok()
    }

    async fn write_cache(&self, contents: &str) {
        let Some(path) = self.cache_path() else {
            return;
        };
        if let Some(dir) = &self.cache_dir {
            let _ = tokio::fs::create_dir_all(dir).await;
        }
        if let Err(e) = tokio::fs::write(&path, contents).await {
            warn!(url = %self.url, path = %path.display(), error = %e, "Failed to write list cache");
        }
    }
}

#[async_trait]
impl RuleLoader for HttpLoader {
    fn source(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<Vec<String>, ResolveError> {
        match self.fetch().await {
            Ok(contents) => {
                debug!(url = %self.url, bytes = contents.len(), "List fetched");
                self.write_cache(&contents).await;
                Ok(contents.lines().map(str::to_string).collect())
            }
            Err(e) => match self.read_cache().await {
                Some(cached) => {
                    warn!(url = %self.url, error = %e, "Fetch failed, using on-disk copy");
                    Ok(cached.lines().map(str::to_string).collect())
                }
                None => Err(e),
            },
        }
    }
}

/// Skip blank lines and `#` comments; every format shares this rule.
pub fn significant_lines(lines: &[String]) -> impl Iterator<Item = &str> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}
