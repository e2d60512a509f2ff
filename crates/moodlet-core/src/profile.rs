//! Display name and avatar of the logged-in user

use crate::auth::DASHBOARD_PATH;
use crate::select::{self, css};
use crate::session::Session;
use crate::{Result, UserProfile};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

pub const DEFAULT_DISPLAY_NAME: &str = "Student";

const NAME_SELECTORS: &[&str] = &[
    ".usertext",
    ".userbutton",
    ".user-profile-name",
    ".dropdown-toggle .userpicture",
];

const AVATAR_SELECTORS: &[&str] = &[".usermenu .userpicture", ".userpicture"];

const PROFILE_HEADING_SELECTORS: &[&str] = &[".page-header-headings h1", ".page-header h1", "h1.h2"];

fn avatar_src(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    select::first_match(scope, selectors)
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
}

/// Profile as shown in the dashboard's user menu
pub fn parse_profile(html: &str) -> UserProfile {
    let document = Html::parse_document(html);
    let root = document.root_element();

    UserProfile {
        display_name: select::first_text(root, NAME_SELECTORS)
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        avatar_url: avatar_src(root, AVATAR_SELECTORS),
    }
}

/// Link to the user's own profile page, if the dashboard shows one
pub fn profile_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = css(r#"a[href*="/user/profile.php"]"#);
    let link = document
        .select(&selector)
        .next()
        .map(|a| select::href_of(a).to_string());
    link
}

/// Refine a dashboard profile with the profile page's heading and picture
pub fn merge_profile_page(profile: UserProfile, html: &str) -> UserProfile {
    let document = Html::parse_document(html);
    let root = document.root_element();

    UserProfile {
        display_name: select::first_text(root, PROFILE_HEADING_SELECTORS)
            .unwrap_or(profile.display_name),
        avatar_url: avatar_src(root, &[".userpicture"]).or(profile.avatar_url),
    }
}

impl Session {
    /// Fetch the profile of the logged-in user
    ///
    /// Missing name or avatar fall back to defaults; only fetch failures
    /// are errors.
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let dashboard = self.get_endpoint(DASHBOARD_PATH).await?;
        Ok(self.profile_from_dashboard(&dashboard.html).await)
    }

    /// Build the profile from already fetched dashboard HTML
    pub async fn profile_from_dashboard(&self, dashboard_html: &str) -> UserProfile {
        let profile = parse_profile(dashboard_html);
        let Some(href) = profile_link(dashboard_html) else {
            return profile;
        };

        let page = match self.resolve(&href) {
            Ok(url) => self.get_page(&url).await,
            Err(e) => Err(e),
        };
        match page {
            Ok(page) => {
                debug!("Refining profile from {}", page.url);
                merge_profile_page(profile, &page.html)
            }
            Err(e) => {
                warn!("Profile page unavailable, using dashboard profile: {}", e);
                profile
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile() {
        let html = r#"
            <div class="usermenu">
                <span class="usertext"> Ada Lovelace </span>
                <img class="userpicture" src="https://m.edu/pluginfile.php/5/user/icon/f1">
            </div>
        "#;
        let profile = parse_profile(html);
        assert_eq!(profile.display_name, "Ada Lovelace");
        assert_eq!(
            profile.avatar_url.as_deref(),
            Some("https://m.edu/pluginfile.php/5/user/icon/f1")
        );
    }

    #[test]
    fn test_parse_profile_defaults() {
        let profile = parse_profile("<html><body><p>Nothing here</p></body></html>");
        assert_eq!(profile, UserProfile::default());
        assert_eq!(profile.display_name, "Student");
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn test_name_selector_priority() {
        let html = r#"<span class="userbutton">Button Name</span><span class="usertext">Text Name</span>"#;
        assert_eq!(parse_profile(html).display_name, "Text Name");
    }

    #[test]
    fn test_merge_profile_page() {
        let dashboard = UserProfile {
            display_name: "ada".to_string(),
            avatar_url: Some("small.png".to_string()),
        };
        let html = r#"<div class="page-header-headings"><h1>Ada Lovelace</h1></div>"#;
        let merged = merge_profile_page(dashboard, html);
        assert_eq!(merged.display_name, "Ada Lovelace");
        assert_eq!(merged.avatar_url.as_deref(), Some("small.png"));
    }

    #[test]
    fn test_profile_link() {
        let html = r#"<a href="https://m.edu/user/profile.php?id=7">Profile</a>"#;
        assert_eq!(
            profile_link(html),
            Some("https://m.edu/user/profile.php?id=7".to_string())
        );
    }
}
