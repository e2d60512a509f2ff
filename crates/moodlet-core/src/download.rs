//! Downloads through the authenticated session

use crate::auth::is_login_url;
use crate::session::Session;
use crate::Material;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Largest buffer reserved up front from a response's Content-Length
const PREALLOC_LIMIT: u64 = 8 << 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Failed to fetch: {0}")]
    Failed(String),

    #[error("Link expired: {0}")]
    Expired(String),
}

/// A fully buffered resource
#[derive(Debug, Clone)]
pub struct Download {
    /// Name to save under, derived from the material
    pub filename: String,
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write into `dir` under the suggested filename
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Whether a name already ends in something that looks like an extension
fn has_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Filename for saving a material
///
/// The extension is guessed from the material kind unless the name already
/// carries one; the response content is never consulted.
pub fn suggested_filename(material: &Material) -> String {
    let mut name: String = material
        .name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    if name.is_empty() {
        name = "download".to_string();
    }
    if has_extension(&name) {
        name
    } else {
        format!("{}.{}", name, material.kind)
    }
}

impl Session {
    /// Fetch a material's bytes with the session cookies
    pub async fn download(&self, material: &Material) -> Result<Download, DownloadError> {
        let url = self
            .resolve(&material.url)
            .map_err(|e| DownloadError::Failed(e.to_string()))?;

        let response = self.get_raw(&url).await.map_err(|e| {
            warn!("Download of {} failed: {}", url, e);
            DownloadError::Failed(e.to_string())
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            return Err(DownloadError::Expired(format!("{} returned {}", url, status)));
        }
        if is_login_url(&final_url) {
            return Err(DownloadError::Expired(format!("{} requires logging in again", url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let expected = response.content_length();

        // Content-Length is only a hint from the server
        let mut bytes = Vec::with_capacity(expected.map_or(0, |n| n.min(PREALLOC_LIMIT) as usize));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Failed(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
            debug!("{}: {} / {:?} bytes", material.name, bytes.len(), expected);
        }

        info!("Downloaded {} ({} bytes)", material.name, bytes.len());
        Ok(Download {
            filename: suggested_filename(material),
            url: final_url,
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MaterialKind;

    #[test]
    fn test_suggested_filename_appends_kind() {
        let m = Material::new("Week 1 Slides", "/mod/resource/view.php?id=1", MaterialKind::File);
        assert_eq!(suggested_filename(&m), "Week 1 Slides.file");

        let m = Material::new("Essay", "/mod/assign/view.php?id=2", MaterialKind::Assignment);
        assert_eq!(suggested_filename(&m), "Essay.assignment");
    }

    #[test]
    fn test_suggested_filename_keeps_extension() {
        let m = Material::new("week1.pdf", "/pluginfile.php/1/week1.pdf", MaterialKind::File);
        assert_eq!(suggested_filename(&m), "week1.pdf");
    }

    #[test]
    fn test_suggested_filename_sanitizes() {
        let m = Material::new("Lab 1/2 v.final draft", "/x", MaterialKind::File);
        assert_eq!(suggested_filename(&m), "Lab 1_2 v.final draft.file");

        let m = Material::new("  ", "/x", MaterialKind::File);
        assert_eq!(suggested_filename(&m), "download.file");
    }

    #[test]
    fn test_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download {
            filename: "notes.txt".to_string(),
            url: Url::parse("https://m.edu/pluginfile.php/1/notes.txt").unwrap(),
            content_type: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        };
        let path = tokio_test::block_on(download.save_to(dir.path())).unwrap();
        assert_eq!(path, dir.path().join("notes.txt"));
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }
}
