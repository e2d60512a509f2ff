//! Cookie-persisting HTTP session against a Moodle installation

use crate::{ClientConfig, Page, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Authenticated (or not yet authenticated) connection to one Moodle site
pub struct Session {
    client: Client,
    base_url: Url,
    config: ClientConfig,
}

impl Session {
    /// Create a new session with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new session with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Endpoint paths are joined relative to the site root, which may
        // itself live below a path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = build_client(&config)?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Root URL of the Moodle site (always ends with `/`)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of a site endpoint such as `login/index.php`
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Resolve a scraped href the way a browser would
    pub fn resolve(&self, href: &str) -> Result<Url> {
        Ok(self.base_url.join(href)?)
    }

    /// GET a page and return its final URL and body
    pub async fn get_page(&self, url: &Url) -> Result<Page> {
        debug!("GET {}", url);
        let response = self.client.get(url.as_str()).send().await?;
        into_page(response).await
    }

    /// GET a site endpoint
    pub async fn get_endpoint(&self, path: &str) -> Result<Page> {
        let url = self.endpoint(path)?;
        self.get_page(&url).await
    }

    /// POST an urlencoded form and follow redirects
    pub async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<Page> {
        debug!("POST {}", url);
        let response = self.client.post(url.as_str()).form(form).send().await?;
        into_page(response).await
    }

    /// Start a raw GET, for callers that need the response itself
    pub(crate) async fn get_raw(&self, url: &Url) -> reqwest::Result<Response> {
        debug!("GET (raw) {}", url);
        self.client.get(url.as_str()).send().await
    }

    /// Drop all cookies by replacing the underlying client
    pub fn reset(&mut self) -> Result<()> {
        self.client = build_client(&self.config)?;
        Ok(())
    }
}

fn build_client(config: &ClientConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

async fn into_page(response: Response) -> Result<Page> {
    let response = response.error_for_status()?;
    let url = response.url().clone();
    let html = response.text().await?;
    debug!("Fetched {} ({} bytes)", url, html.len());
    Ok(Page { url, html })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(base: &str) -> Session {
        Session::with_config(ClientConfig {
            base_url: base.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_at_site_root() {
        let s = session("https://moodle.example.edu");
        assert_eq!(
            s.endpoint("login/index.php").unwrap().as_str(),
            "https://moodle.example.edu/login/index.php"
        );
    }

    #[test]
    fn test_endpoint_below_path_prefix() {
        let s = session("https://example.edu/moodle");
        assert_eq!(
            s.endpoint("/course/view.php?id=4").unwrap().as_str(),
            "https://example.edu/moodle/course/view.php?id=4"
        );
    }

    #[test]
    fn test_resolve_keeps_absolute_hrefs() {
        let s = session("https://example.edu/moodle");
        assert_eq!(
            s.resolve("https://cdn.example.edu/file.pdf").unwrap().as_str(),
            "https://cdn.example.edu/file.pdf"
        );
        assert_eq!(
            s.resolve("/mod/folder/view.php?id=5").unwrap().as_str(),
            "https://example.edu/mod/folder/view.php?id=5"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = Session::with_config(ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
