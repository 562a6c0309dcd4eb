//! Module proxy client

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::fetch::ModuleSource;
use crate::types::Version;

/// Default base URL for the module proxy
pub const DEFAULT_BASE_URL: &str = "https://proxy.golang.org";

/// Reads extracted module metadata from a proxy.
///
/// Each version is served as JSON at `{base}/{module}/@v/{version}.json`.
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    /// Creates a client for the proxy at `base_url`
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("modsearch")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn version_url(&self, module_path: &str, version: &str) -> String {
        format!(
            "{}/{}/@v/{}.json",
            self.base_url,
            encode_path(module_path),
            encode_path(version)
        )
    }
}

#[async_trait::async_trait]
impl ModuleSource for ProxyClient {
    async fn fetch_version(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Version, FetchError> {
        let url = self.version_url(module_path, version);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        // The proxy answers 404 or 410 for versions it does not have
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::NotFound(format!("{module_path}@{version}")));
        }

        if !status.is_success() {
            warn!("Module proxy returned status {}: {}", status, url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let fetched: Version = response.json().await.map_err(|e| {
            warn!("Failed to decode module proxy response: {}", e);
            FetchError::InvalidResponse(e.to_string())
        })?;

        if fetched.module_path != module_path || fetched.version != version {
            return Err(FetchError::InvalidResponse(format!(
                "requested {}@{}, got {}@{}",
                module_path, version, fetched.module_path, fetched.version
            )));
        }

        Ok(fetched.with_series_path())
    }
}

/// Encodes a module path or version for use in proxy URLs.
/// Uppercase letters are escaped as !{lowercase}.
fn encode_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
