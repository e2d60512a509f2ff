//! Moodlet Core Library
//!
//! Core functionality for the moodlet Moodle client including:
//! - Cookie-persisting HTTP session against a Moodle base URL
//! - Form login, logout and session checks
//! - Dashboard scraping for the user profile and enrolled courses
//! - Course, folder and private-file material parsing
//! - Folder navigation with back history
//! - Downloads through the authenticated session

pub mod auth;
pub mod courses;
pub mod download;
pub mod materials;
pub mod navigator;
pub mod profile;
pub mod select;
pub mod session;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Re-export key types
pub use auth::{Credentials, LoginError};
pub use download::{Download, DownloadError};
pub use navigator::{CourseView, Frame, NavError, Navigator, View};
pub use session::Session;

#[derive(Error, Debug)]
pub enum MoodleError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Navigation(#[from] NavError),

    #[error("Not logged in (session expired?)")]
    NotLoggedIn,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MoodleError>;

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: url::Url,
    /// The raw HTML content
    pub html: String,
}

/// The logged-in user as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            display_name: profile::DEFAULT_DISPLAY_NAME.to_string(),
            avatar_url: None,
        }
    }
}

/// An enrolled course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Numeric course id as it appears in `/course/view.php?id=`
    pub id: String,
    pub name: String,
}

/// What a material link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    File,
    Folder,
    Assignment,
    Url,
    Forum,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::File => "file",
            MaterialKind::Folder => "folder",
            MaterialKind::Assignment => "assignment",
            MaterialKind::Url => "url",
            MaterialKind::Forum => "forum",
        }
    }

    /// Whether the resource can be fetched as bytes
    pub fn is_downloadable(&self) -> bool {
        matches!(self, MaterialKind::File | MaterialKind::Assignment)
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource listed on a course, folder or files page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// The href exactly as scraped
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
}

impl Material {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
        }
    }
}

/// Configuration for the HTTP session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the Moodle installation, e.g. `https://moodle.example.edu`
    pub base_url: String,
    /// User agent string
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Desktop Chrome identification; some Moodle themes serve a reduced page
/// to unknown agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_kind_serializes_lowercase() {
        let material = Material::new("Notes", "/mod/folder/view.php?id=5", MaterialKind::Folder);
        let json = serde_json::to_string(&material).unwrap();
        assert!(json.contains(r#""type":"folder""#));
    }

    #[test]
    fn test_downloadable_kinds() {
        assert!(MaterialKind::File.is_downloadable());
        assert!(MaterialKind::Assignment.is_downloadable());
        assert!(!MaterialKind::Folder.is_downloadable());
        assert!(!MaterialKind::Url.is_downloadable());
    }
}
