//! Course and folder navigation with back history

use crate::session::Session;
use crate::{Course, Material, MaterialKind, Result};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("'{0}' is not a folder")]
    NotAFolder(String),

    #[error("No course is open")]
    NoCourse,
}

/// A listing to return to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub title: String,
    pub materials: Vec<Material>,
}

/// An open course, possibly several folders deep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseView {
    pub course: Course,
    pub title: String,
    pub materials: Vec<Material>,
    history: Vec<Frame>,
}

impl CourseView {
    fn new(course: Course, materials: Vec<Material>) -> Self {
        Self {
            title: course.name.clone(),
            course,
            materials,
            history: Vec::new(),
        }
    }

    /// Number of folders entered below the course page
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Titles from the course page down to the current folder
    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.history
            .iter()
            .map(|frame| frame.title.as_str())
            .chain(std::iter::once(self.title.as_str()))
            .collect()
    }
}

/// What is on screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Dashboard,
    Course(CourseView),
    PrivateFiles(Vec<Material>),
}

/// Owns the navigation state for one user session
#[derive(Debug, Default)]
pub struct Navigator {
    view: View,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn current_course(&self) -> Option<&Course> {
        match &self.view {
            View::Course(cv) => Some(&cv.course),
            _ => None,
        }
    }

    /// Heading for the current listing
    pub fn title(&self) -> &str {
        match &self.view {
            View::Dashboard => "Dashboard",
            View::Course(cv) => &cv.title,
            View::PrivateFiles(_) => "Private files",
        }
    }

    pub fn materials(&self) -> &[Material] {
        match &self.view {
            View::Dashboard => &[],
            View::Course(cv) => &cv.materials,
            View::PrivateFiles(files) => files,
        }
    }

    /// Whether `go_back` would change anything
    pub fn can_go_back(&self) -> bool {
        matches!(&self.view, View::Course(cv) if !cv.history.is_empty())
    }

    /// Show a course's top-level materials, discarding any folder history
    pub fn enter_course(&mut self, course: Course, materials: Vec<Material>) {
        debug!("Entering course {} ({})", course.name, course.id);
        self.view = View::Course(CourseView::new(course, materials));
    }

    /// Check that `folder` can be opened from the current view
    pub fn ensure_can_open(&self, folder: &Material) -> std::result::Result<(), NavError> {
        if folder.kind != MaterialKind::Folder {
            return Err(NavError::NotAFolder(folder.name.clone()));
        }
        match self.view {
            View::Course(_) => Ok(()),
            _ => Err(NavError::NoCourse),
        }
    }

    /// Show a folder's contents, remembering the current listing
    pub fn enter_folder(
        &mut self,
        folder: &Material,
        materials: Vec<Material>,
    ) -> std::result::Result<(), NavError> {
        self.ensure_can_open(folder)?;
        if let View::Course(cv) = &mut self.view {
            let previous = Frame {
                title: std::mem::replace(&mut cv.title, folder.name.clone()),
                materials: std::mem::replace(&mut cv.materials, materials),
            };
            cv.history.push(previous);
            debug!("Entered folder {} (depth {})", folder.name, cv.history.len());
        }
        Ok(())
    }

    /// Return to the previous listing; `false` when there is none
    pub fn go_back(&mut self) -> bool {
        let View::Course(cv) = &mut self.view else {
            return false;
        };
        match cv.history.pop() {
            Some(frame) => {
                cv.title = frame.title;
                cv.materials = frame.materials;
                true
            }
            None => false,
        }
    }

    pub fn show_private_files(&mut self, files: Vec<Material>) {
        self.view = View::PrivateFiles(files);
    }

    /// Back to the empty dashboard, e.g. after logout
    pub fn reset(&mut self) {
        self.view = View::Dashboard;
    }

    /// Fetch a course page and show it
    ///
    /// On failure the current view is left untouched.
    pub async fn select_course(&mut self, session: &Session, course: Course) -> Result<()> {
        let materials = session.course_materials(&course.id).await?;
        info!("Opened course {} with {} materials", course.name, materials.len());
        self.enter_course(course, materials);
        Ok(())
    }

    /// Fetch a folder page and show it
    ///
    /// The history entry is only pushed once the folder has loaded, so a
    /// failed fetch leaves the view and history exactly as they were.
    pub async fn open_folder(&mut self, session: &Session, folder: &Material) -> Result<()> {
        self.ensure_can_open(folder)?;
        let materials = session.folder_contents(&folder.url).await?;
        self.enter_folder(folder, materials)?;
        Ok(())
    }

    /// Fetch the private files page and show it
    pub async fn open_private_files(&mut self, session: &Session) -> Result<()> {
        let files = session.private_files().await?;
        self.show_private_files(files);
        Ok(())
    }
}
