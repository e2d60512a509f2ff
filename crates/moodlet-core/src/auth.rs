//! Form login, logout and session checks

use crate::select::{self, css};
use crate::session::Session;
use crate::{Page, Result};
use scraper::Html;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub const LOGIN_PATH: &str = "login/index.php";
pub const DASHBOARD_PATH: &str = "my/index.php";
pub const LOGOUT_PATH: &str = "login/logout.php";

/// Present in the body of a rejected login
const LOGIN_ERROR_MARKER: &str = "loginerrormessage";

const LOGIN_ERROR_SELECTORS: &[&str] = &[".loginerrors .error", ".notifyproblem", ".alert-danger"];

const DEFAULT_LOGIN_ERROR: &str = "Login failed";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Moodle answered but refused the credentials
    #[error("{0}")]
    Rejected(String),

    #[error("Error occurred, try again. If not reached, the server might be unreachable.")]
    Unreachable,
}

/// Username and password, held only for the duration of a login call
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Value of the hidden `logintoken` field, empty when the form has none
pub fn extract_login_token(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = css(r#"input[name="logintoken"]"#);
    let token = document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .unwrap_or("")
        .to_string();
    token
}

/// Whether a URL is the login form
pub fn is_login_url(url: &Url) -> bool {
    url.as_str().contains(LOGIN_PATH)
}

/// A login POST succeeded iff it left the login page without an error marker
pub fn login_succeeded(response: &Page) -> bool {
    !is_login_url(&response.url) && !response.html.contains(LOGIN_ERROR_MARKER)
}

/// Error text Moodle shows on a rejected login
pub fn login_error_message(html: &str) -> String {
    let document = Html::parse_document(html);
    let message = select::first_match(document.root_element(), LOGIN_ERROR_SELECTORS)
        .map(select::text_of)
        .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string());
    message
}

/// Logout link including its `sesskey`, if the page shows one
pub fn logout_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = css(r#"a[href*="login/logout.php"]"#);
    let link = document
        .select(&selector)
        .next()
        .map(|a| select::href_of(a).to_string());
    link
}

impl Session {
    /// Log in with the Moodle login form
    pub async fn login(&self, credentials: &Credentials) -> std::result::Result<(), LoginError> {
        match self.submit_login(credentials).await {
            Ok(None) => {
                info!("Logged in as {}", credentials.username);
                Ok(())
            }
            Ok(Some(message)) => {
                warn!("Login rejected: {}", message);
                Err(LoginError::Rejected(message))
            }
            Err(e) => {
                warn!("Login request failed: {}", e);
                Err(LoginError::Unreachable)
            }
        }
    }

    /// Returns the rejection message, or `None` on success
    async fn submit_login(&self, credentials: &Credentials) -> Result<Option<String>> {
        let login_url = self.endpoint(LOGIN_PATH)?;
        let mut login_page = self.get_page(&login_url).await?;

        if !is_login_url(&login_page.url) {
            // Moodle bounces a logged-in browser away from the form
            match logout_link(&login_page.html) {
                Some(href) => {
                    debug!("Active session found, logging out before new login");
                    let logout_url = self.resolve(&href)?;
                    self.get_page(&logout_url).await?;
                    login_page = self.get_page(&login_url).await?;
                }
                None => {
                    debug!("Login form bounced to {}, checking session", login_page.url);
                    if self.check_session().await? {
                        return Ok(None);
                    }
                    return Ok(Some(format!("Login form unavailable at {}", login_page.url)));
                }
            }
        }

        let token = extract_login_token(&login_page.html);
        debug!("Login token present: {}", !token.is_empty());

        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("logintoken", token.as_str()),
            ("anchor", ""),
            ("rememberusername", "1"),
        ];
        let response = self.post_form(&login_url, &form).await?;

        if login_succeeded(&response) {
            Ok(None)
        } else {
            Ok(Some(login_error_message(&response.html)))
        }
    }

    /// Whether the dashboard is reachable without being sent to the login form
    pub async fn check_session(&self) -> Result<bool> {
        let page = self.get_endpoint(DASHBOARD_PATH).await?;
        Ok(!is_login_url(&page.url))
    }

    /// End the Moodle session and forget all cookies
    ///
    /// Remote failures are logged and ignored; local state is always cleared.
    pub async fn logout(&mut self) -> Result<()> {
        if let Err(e) = self.remote_logout().await {
            warn!("Logout endpoint failed, clearing local session anyway: {}", e);
        }
        self.reset()?;
        info!("Logged out");
        Ok(())
    }

    async fn remote_logout(&self) -> Result<()> {
        let dashboard = self.get_endpoint(DASHBOARD_PATH).await?;
        let url = match logout_link(&dashboard.html) {
            Some(href) => self.resolve(&href)?,
            None => self.endpoint(LOGOUT_PATH)?,
        };
        self.get_page(&url).await?;
        Ok(())
    }
}
