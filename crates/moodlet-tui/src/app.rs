//! Application state management

use crate::config::Config;
use crate::vim::{Command, VimMode};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use moodlet_core::download::suggested_filename;
use moodlet_core::{
    Course, Credentials, DownloadError, Material, MaterialKind, Navigator, Session, UserProfile,
};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Which pane receives list navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Courses,
    Materials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

/// Contents of the login screen
#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    /// Message from the last failed attempt
    pub error: Option<String>,
}

impl LoginForm {
    fn new(username: Option<String>) -> Self {
        let field = if username.is_some() {
            LoginField::Password
        } else {
            LoginField::Username
        };
        Self {
            username: username.unwrap_or_default(),
            password: String::new(),
            field,
            error: None,
        }
    }

    fn active_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

/// Main application state
pub struct App {
    /// Current input mode
    pub mode: VimMode,
    /// Current input (for command mode)
    pub input: String,
    /// Status message
    pub status: Option<String>,
    /// Whether a request is in flight
    pub loading: bool,
    /// Configuration
    pub config: Config,
    pub login: LoginForm,
    pub profile: UserProfile,
    pub courses: Vec<Course>,
    pub navigator: Navigator,
    pub focus: Focus,
    pub course_index: usize,
    pub material_index: usize,
    session: Session,
    /// Where settings are persisted, `None` when there is no config dir
    config_file: Option<PathBuf>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, username: Option<String>) -> Result<Self> {
        let session = Session::with_config(config.to_client_config())?;
        let username = username.or_else(|| config.session.last_username.clone());

        Ok(Self {
            mode: VimMode::Login,
            input: String::new(),
            status: None,
            loading: false,
            config,
            login: LoginForm::new(username),
            profile: UserProfile::default(),
            courses: Vec::new(),
            navigator: Navigator::new(),
            focus: Focus::Courses,
            course_index: 0,
            material_index: 0,
            session,
            config_file: Config::config_path(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.session.base_url().as_str()
    }

    pub fn selected_course(&self) -> Option<&Course> {
        self.courses.get(self.course_index)
    }

    pub fn selected_material(&self) -> Option<&Material> {
        self.navigator.materials().get(self.material_index)
    }

    /// Handle a key event; returns `true` when the app should quit
    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            VimMode::Login => self.handle_login_key(key).await,
            VimMode::Normal => self.handle_normal_key(key).await,
            VimMode::Command => self.handle_command_key(key).await,
        }
    }

    async fn handle_login_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc => return Ok(true),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.toggle_field()
            }
            KeyCode::Backspace => {
                self.login.active_mut().pop();
            }
            KeyCode::Enter => {
                if self.login.field == LoginField::Username {
                    self.login.field = LoginField::Password;
                } else {
                    self.submit_login().await?;
                }
            }
            KeyCode::Char(c) => self.login.active_mut().push(c),
            _ => {}
        }
        Ok(false)
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char(':') => {
                self.mode = VimMode::Command;
                self.input.clear();
            }

            // Selection
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') => self.select_edge(false),
            KeyCode::Char('G') => self.select_edge(true),
            KeyCode::Tab => self.toggle_focus(),

            KeyCode::Enter | KeyCode::Char('l') => match self.focus {
                Focus::Courses => self.open_selected_course().await,
                Focus::Materials => self.activate_selected_material().await,
            },
            KeyCode::Backspace | KeyCode::Char('h') => self.back(),

            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.logout().await?
            }
            KeyCode::Char('d') => self.download_selected(None).await,
            KeyCode::Char('y') => self.yank_selected(),
            KeyCode::Char('r') => self.refresh().await?,
            KeyCode::Char('f') => self.open_private_files().await,
            _ => {}
        }
        Ok(false)
    }

    async fn handle_command_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc => {
                self.mode = VimMode::Normal;
                self.input.clear();
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.input);
                self.mode = VimMode::Normal;
                return self.execute_command(&command).await;
            }
            KeyCode::Backspace => {
                if self.input.pop().is_none() {
                    self.mode = VimMode::Normal;
                }
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        Ok(false)
    }

    async fn execute_command(&mut self, input: &str) -> Result<bool> {
        debug!("Executing command: {}", input);
        match Command::parse(input) {
            Command::Quit => return Ok(true),
            Command::Logout => self.logout().await?,
            Command::Refresh => self.refresh().await?,
            Command::Files => self.open_private_files().await,
            Command::Course(id) => {
                match self.courses.iter().position(|c| c.id == id) {
                    Some(index) => {
                        self.course_index = index;
                        self.open_selected_course().await;
                    }
                    None => self.status = Some(format!("Not enrolled in course {}", id)),
                }
            }
            Command::Download(dir) => self.download_selected(dir.map(PathBuf::from)).await,
            Command::Set(key, value) => self.set_option(&key, &value).await?,
            Command::Unknown(msg) => self.status = Some(format!("Unknown command: {}", msg)),
            Command::Empty => {}
        }
        Ok(false)
    }

    fn list_len(&self) -> usize {
        match self.focus {
            Focus::Courses => self.courses.len(),
            Focus::Materials => self.navigator.materials().len(),
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match self.focus {
            Focus::Courses => &mut self.course_index,
            Focus::Materials => &mut self.material_index,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let index = self.selection_mut();
        *index = index.saturating_add_signed(delta).min(len - 1);
    }

    fn select_edge(&mut self, last: bool) {
        let len = self.list_len();
        *self.selection_mut() = if last { len.saturating_sub(1) } else { 0 };
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Courses if !self.navigator.materials().is_empty() => Focus::Materials,
            _ => Focus::Courses,
        };
    }

    async fn submit_login(&mut self) -> Result<()> {
        if self.login.username.trim().is_empty() || self.login.password.is_empty() {
            self.login.error = Some("Username and password are required".to_string());
            return Ok(());
        }

        self.loading = true;
        let credentials = Credentials::new(self.login.username.trim(), self.login.password.as_str());
        self.login.password.clear();
        let result = self.session.login(&credentials).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.login.error = None;
                self.mode = VimMode::Normal;
                self.config.session.last_username = Some(credentials.username.clone());
                self.save_config();
                self.load_dashboard().await;
                self.restore_last_course().await;
            }
            Err(e) => {
                self.login.error = Some(e.to_string());
            }
        }
        Ok(())
    }

    /// Reload the profile and course list
    async fn load_dashboard(&mut self) {
        self.profile = match self.session.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Profile unavailable: {}", e);
                UserProfile::default()
            }
        };

        match self.session.list_courses().await {
            Ok(courses) => {
                self.status = Some(format!("Welcome, {}! {} courses", self.profile.display_name, courses.len()));
                self.courses = courses;
            }
            Err(e) => {
                self.status = Some(format!("Could not load courses: {}", e));
                self.courses.clear();
            }
        }
        self.course_index = self.course_index.min(self.courses.len().saturating_sub(1));
    }

    async fn restore_last_course(&mut self) {
        let Some(id) = self.config.session.last_course_id.clone() else {
            return;
        };
        if let Some(index) = self.courses.iter().position(|c| c.id == id) {
            self.course_index = index;
            self.open_selected_course().await;
        }
    }

    async fn open_selected_course(&mut self) {
        let Some(course) = self.selected_course().cloned() else {
            return;
        };

        self.loading = true;
        let result = self.navigator.select_course(&self.session, course.clone()).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.material_index = 0;
                self.focus = Focus::Materials;
                self.status = Some(format!("{} materials", self.navigator.materials().len()));
                self.config.session.last_course_id = Some(course.id);
                self.save_config();
            }
            Err(e) => self.status = Some(format!("Error: {}", e)),
        }
    }

    async fn activate_selected_material(&mut self) {
        let Some(material) = self.selected_material().cloned() else {
            return;
        };
        match material.kind {
            MaterialKind::Folder => self.open_folder(&material).await,
            kind if kind.is_downloadable() => self.download_selected(None).await,
            _ => self.yank_selected(),
        }
    }

    async fn open_folder(&mut self, folder: &Material) {
        self.loading = true;
        let result = self.navigator.open_folder(&self.session, folder).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.material_index = 0;
                self.status = None;
            }
            Err(e) => self.status = Some(format!("Error: {}", e)),
        }
    }

    async fn open_private_files(&mut self) {
        self.loading = true;
        let result = self.navigator.open_private_files(&self.session).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.material_index = 0;
                self.focus = Focus::Materials;
                self.status = Some(format!("{} private files", self.navigator.materials().len()));
            }
            Err(e) => self.status = Some(format!("Error: {}", e)),
        }
    }

    /// Leave the current folder, or return focus to the course list
    pub fn back(&mut self) {
        if self.navigator.go_back() {
            self.material_index = 0;
        } else {
            self.focus = Focus::Courses;
        }
    }

    async fn download_selected(&mut self, dir: Option<PathBuf>) {
        let Some(material) = self.selected_material().cloned() else {
            self.status = Some("Nothing selected".to_string());
            return;
        };
        if !material.kind.is_downloadable() {
            self.status = Some(format!("{} is a {}, not a file", material.name, material.kind));
            return;
        }

        self.loading = true;
        self.status = Some(format!("Downloading {}...", suggested_filename(&material)));
        let result = self.session.download(&material).await;
        self.loading = false;

        let download = match result {
            Ok(download) => download,
            Err(DownloadError::Expired(reason)) => {
                self.status = Some(format!("Link expired ({}), press r to check the session", reason));
                return;
            }
            Err(e) => {
                self.status = Some(format!("Error: {}", e));
                return;
            }
        };

        let dir = dir.unwrap_or_else(|| self.config.download_dir());
        self.status = Some(match download.save_to(&dir).await {
            Ok(path) => format!("Saved {}", path.display()),
            Err(e) => format!("Could not save {}: {}", download.filename, e),
        });
    }

    fn yank_selected(&mut self) {
        let Some(material) = self.selected_material() else {
            return;
        };
        let url = match self.session.resolve(&material.url) {
            Ok(url) => url.to_string(),
            Err(_) => material.url.clone(),
        };
        self.yank_to_clipboard(&url);
    }

    fn yank_to_clipboard(&mut self, text: &str) {
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => {
                if clipboard.set_text(text).is_ok() {
                    self.status = Some(format!("Yanked: {}", text));
                }
            }
            Err(_) => {
                self.status = Some("Clipboard not available".to_string());
            }
        }
    }

    /// Re-check the session; an expired one returns to the login form
    async fn refresh(&mut self) -> Result<()> {
        self.loading = true;
        let alive = self.session.check_session().await;
        self.loading = false;

        match alive {
            Ok(true) => {
                self.load_dashboard().await;
                if let Some(course) = self.navigator.current_course().cloned() {
                    // Reloading the course drops folder history
                    if let Some(index) = self.courses.iter().position(|c| c.id == course.id) {
                        self.course_index = index;
                        self.open_selected_course().await;
                    }
                }
            }
            Ok(false) => {
                info!("Session expired");
                self.return_to_login(Some("Session expired, please log in again".to_string()));
            }
            Err(e) => self.status = Some(format!("Error: {}", e)),
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.session.logout().await?;
        self.return_to_login(None);
        self.status = Some("Logged out".to_string());
        Ok(())
    }

    fn return_to_login(&mut self, error: Option<String>) {
        self.navigator.reset();
        self.courses.clear();
        self.profile = UserProfile::default();
        self.course_index = 0;
        self.material_index = 0;
        self.focus = Focus::Courses;
        let typed = std::mem::take(&mut self.login.username);
        let username = self
            .config
            .session
            .last_username
            .clone()
            .or_else(|| Some(typed).filter(|u| !u.is_empty()));
        self.login = LoginForm::new(username);
        self.login.error = error;
        self.mode = VimMode::Login;
    }

    /// Apply a `:set` option; connection settings need a fresh session
    async fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        if let Err(e) = self.config.apply(key, value) {
            self.status = Some(format!("Error: {}", e));
            return Ok(());
        }
        self.save_config();

        if !Config::affects_client(key) {
            self.status = Some(format!("{} = {}", key, value));
            return Ok(());
        }

        if self.mode != VimMode::Login {
            if let Err(e) = self.session.logout().await {
                warn!("Logout before reconnecting failed: {}", e);
            }
        }
        self.session = Session::with_config(self.config.to_client_config())?;
        info!("Session rebuilt for {}", self.session.base_url());
        self.return_to_login(None);
        self.status = Some(format!("{} = {}, log in again", key, value));
        Ok(())
    }

    fn save_config(&self) {
        let Some(path) = &self.config_file else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            warn!("Failed to save config: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn app(username: Option<&str>) -> App {
        let mut app = App::new(Config::default(), username.map(str::to_string)).unwrap();
        app.config_file = None;
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        tokio_test::block_on(app.handle_key(key(code))).unwrap()
    }

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_login_form_typing() {
        let mut app = app(None);
        assert_eq!(app.mode, VimMode::Login);
        assert_eq!(app.login.field, LoginField::Username);

        for c in "ada".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Tab);
        for c in "pw".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.login.username, "ada");
        assert_eq!(app.login.password, "p");
    }

    #[test]
    fn test_remembered_username_focuses_password() {
        let app = app(Some("ada"));
        assert_eq!(app.login.username, "ada");
        assert_eq!(app.login.field, LoginField::Password);
    }

    #[test]
    fn test_empty_credentials_rejected_locally() {
        let mut app = app(Some("ada"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, VimMode::Login);
        assert!(app.login.error.is_some());
    }

    #[test]
    fn test_escape_quits_login() {
        let mut app = app(None);
        assert!(press(&mut app, KeyCode::Esc));
    }

    #[test]
    fn test_selection_is_clamped() {
        let mut app = app(None);
        app.mode = VimMode::Normal;
        app.courses = vec![course("1", "A"), course("2", "B"), course("3", "C")];

        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.course_index, 0);
        for _ in 0..5 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.course_index, 2);
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.course_index, 0);
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.course_index, 2);
    }

    #[test]
    fn test_focus_needs_materials() {
        let mut app = app(None);
        app.mode = VimMode::Normal;
        app.toggle_focus();
        assert_eq!(app.focus, Focus::Courses);

        app.navigator.enter_course(
            course("12", "Operating Systems"),
            vec![Material::new("Notes", "/mod/folder/view.php?id=5", MaterialKind::Folder)],
        );
        app.toggle_focus();
        assert_eq!(app.focus, Focus::Materials);
        app.back();
        assert_eq!(app.focus, Focus::Courses);
    }

    #[test]
    fn test_back_pops_folder_first() {
        let mut app = app(None);
        let folder = Material::new("Notes", "/mod/folder/view.php?id=5", MaterialKind::Folder);
        app.navigator.enter_course(course("12", "Operating Systems"), vec![folder.clone()]);
        app.navigator.enter_folder(&folder, vec![]).unwrap();
        app.focus = Focus::Materials;

        app.back();
        assert_eq!(app.navigator.title(), "Operating Systems");
        assert_eq!(app.focus, Focus::Materials);
    }

    #[test]
    fn test_command_mode() {
        let mut app = app(None);
        app.mode = VimMode::Normal;
        press(&mut app, KeyCode::Char(':'));
        assert_eq!(app.mode, VimMode::Command);
        for c in "bogus".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert!(!press(&mut app, KeyCode::Enter));
        assert_eq!(app.mode, VimMode::Normal);
        assert_eq!(app.status.as_deref(), Some("Unknown command: bogus"));

        press(&mut app, KeyCode::Char(':'));
        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Enter));
    }

    #[test]
    fn test_set_base_url_rebuilds_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(Some("ada"));
        app.config_file = Some(dir.path().join("config.toml"));

        tokio_test::block_on(app.execute_command("set url=https://other.edu/moodle")).unwrap();
        assert_eq!(app.base_url(), "https://other.edu/moodle/");
        assert_eq!(app.mode, VimMode::Login);
        assert_eq!(app.login.username, "ada");

        let saved = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.general.base_url, "https://other.edu/moodle");
    }

    #[test]
    fn test_set_rejects_bad_url_and_keeps_session() {
        let mut app = app(None);
        let before = app.base_url().to_string();

        tokio_test::block_on(app.execute_command("set url=not a url")).unwrap();
        assert_eq!(app.base_url(), before);
        assert!(app.status.as_deref().unwrap_or("").starts_with("Error:"));
    }

    #[test]
    fn test_download_requires_downloadable_kind() {
        let mut app = app(None);
        app.mode = VimMode::Normal;
        app.navigator.enter_course(
            course("12", "Operating Systems"),
            vec![Material::new("Notes", "/mod/folder/view.php?id=5", MaterialKind::Folder)],
        );
        app.focus = Focus::Materials;
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.status.as_deref(), Some("Notes is a folder, not a file"));
    }
}
