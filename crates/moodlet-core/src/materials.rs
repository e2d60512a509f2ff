//! Material parsing for course, folder and private-file pages

use crate::select::{self, css, Strategy};
use crate::session::Session;
use crate::{Material, MaterialKind, Result};
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const COURSE_PATH: &str = "course/view.php";
pub const PRIVATE_FILES_PATH: &str = "user/files.php";

const ACTIVITY_SELECTOR: &str = ".activity";

const ACTIVITY_NAME_SELECTORS: &[&str] = &[".instancename", ".activityname"];

/// Screen-reader suffixes Moodle appends inside activity names
const NAME_NOISE: &[&str] = &["File", "Folder"];

const MODULE_LINKS: &str = r#"a[href*="/mod/"]"#;

/// Lower-case name fragments that mark coursework handed in by students
const ASSIGNMENT_KEYWORDS: &[&str] = &[
    "assignment",
    "task",
    "project",
    "submission",
    "homework",
    "quiz",
    "lab work",
];

const FOLDER_REGIONS: &[&str] = &[r#"[role="main"]"#, ".region-main"];

const FOLDER_LINK_SELECTORS: &[&str] = &[
    ".fp-filename-icon a, .fp-filename a",
    ".activityinstance a",
    ".generaltable a, .urlworkaround a",
];

const FILE_LINKS: &str = ".fp-filename-icon a, .fp-filename a";

/// The "Download folder" button is a zip of the listing, not an entry
const DOWNLOAD_ALL_LABEL: &str = "Download folder";

fn is_course_noise(name: &str) -> bool {
    name.contains("Announcements") || name.contains("Attendance")
}

/// Kind from an href alone
pub fn classify_href(href: &str) -> MaterialKind {
    if href.contains("folder") {
        MaterialKind::Folder
    } else if href.contains("assign") {
        MaterialKind::Assignment
    } else if href.contains("url") {
        MaterialKind::Url
    } else {
        MaterialKind::File
    }
}

/// Kind of an activity from its class list, href and display name
///
/// Structural signals win over the name: a folder called "Assignment
/// Folder" is still a folder.
pub fn classify_activity(classes: &str, href: &str, name: &str) -> MaterialKind {
    let has = |marker: &str| classes.contains(marker) || href.contains(marker);

    if has("folder") {
        MaterialKind::Folder
    } else if has("assign") {
        MaterialKind::Assignment
    } else if has("url") {
        MaterialKind::Url
    } else if classes.contains("forum") {
        MaterialKind::Forum
    } else {
        let lower = name.to_lowercase();
        if ASSIGNMENT_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            MaterialKind::Assignment
        } else {
            MaterialKind::File
        }
    }
}

fn activity_name(node: ElementRef<'_>, anchor: ElementRef<'_>) -> String {
    match select::first_match(node, ACTIVITY_NAME_SELECTORS) {
        Some(name_el) => {
            let mut name: String = name_el.text().collect();
            for noise in NAME_NOISE {
                name = name.replace(noise, "");
            }
            name.trim().to_string()
        }
        None => select::text_of(anchor),
    }
}

/// Activity blocks of the course page
fn from_activities(root: ElementRef<'_>) -> Option<Vec<Material>> {
    let anchor_selector = css("a");
    let mut materials = Vec::new();

    for node in root.select(&css(ACTIVITY_SELECTOR)) {
        let Some(anchor) = node.select(&anchor_selector).next() else {
            continue;
        };

        let name = activity_name(node, anchor);
        if is_course_noise(&name) {
            continue;
        }

        let href = select::href_of(anchor);
        let classes = node.value().attr("class").unwrap_or("");
        let kind = classify_activity(classes, href, &name);
        materials.push(Material::new(name, href, kind));
    }

    select::non_empty(materials)
}

/// Any module link on the page, for themes without activity blocks
fn from_module_links(root: ElementRef<'_>) -> Option<Vec<Material>> {
    let mut materials: Vec<Material> = Vec::new();

    for link in root.select(&css(MODULE_LINKS)) {
        let href = select::href_of(link);
        if href.contains("label") || href.contains("forum") {
            continue;
        }

        let name = select::text_of(link);
        if name.contains("Announcements") {
            continue;
        }

        if materials.iter().any(|m| m.url == href) {
            continue;
        }
        materials.push(Material::new(name, href, classify_href(href)));
    }

    select::non_empty(materials)
}

/// Materials listed on a course page, in document order
pub fn parse_materials(html: &str) -> Vec<Material> {
    let document = Html::parse_document(html);
    let strategies: [Strategy<Vec<Material>>; 2] = [from_activities, from_module_links];
    let materials = select::first_some(document.root_element(), &strategies).unwrap_or_default();
    debug!("Parsed {} materials", materials.len());
    materials
}

/// Kind of a folder page entry
///
/// Files inside a folder are served from `pluginfile.php/.../mod_folder/...`,
/// which names the folder module but is still a file.
pub fn classify_folder_entry(href: &str) -> MaterialKind {
    if href.contains("folder") && !href.contains("pluginfile") {
        MaterialKind::Folder
    } else {
        MaterialKind::File
    }
}

fn folder_entry_name(link: ElementRef<'_>) -> String {
    select::first_match(link, &[".fp-filename", ".instancename"])
        .map(select::text_of)
        .unwrap_or_else(|| select::text_of(link))
}

/// Entries of a folder page
pub fn parse_folder(html: &str) -> Vec<Material> {
    let document = Html::parse_document(html);
    let scope = select::first_match(document.root_element(), FOLDER_REGIONS)
        .unwrap_or_else(|| document.root_element());

    let materials: Vec<Material> = select::first_non_empty(scope, FOLDER_LINK_SELECTORS)
        .into_iter()
        .filter_map(|link| {
            let name = folder_entry_name(link);
            if name.is_empty() || name.contains(DOWNLOAD_ALL_LABEL) {
                return None;
            }
            let href = select::href_of(link);
            Some(Material::new(name, href, classify_folder_entry(href)))
        })
        .collect();
    debug!("Parsed {} folder entries", materials.len());
    materials
}

/// Files in the user's private file area
pub fn parse_private_files(html: &str) -> Vec<Material> {
    let document = Html::parse_document(html);
    let selector = css(FILE_LINKS);
    let files: Vec<Material> = document
        .select(&selector)
        .filter_map(|link| {
            let name = folder_entry_name(link);
            if name.is_empty() {
                return None;
            }
            Some(Material::new(name, select::href_of(link), MaterialKind::File))
        })
        .collect();
    files
}

impl Session {
    /// Fetch and parse a course page
    pub async fn course_materials(&self, course_id: &str) -> Result<Vec<Material>> {
        let mut url = self.endpoint(COURSE_PATH)?;
        url.query_pairs_mut().append_pair("id", course_id);
        let page = self.get_page(&url).await?;
        let materials = parse_materials(&page.html);
        info!("Course {}: {} materials", course_id, materials.len());
        Ok(materials)
    }

    /// Fetch and parse a folder page by its scraped href
    pub async fn folder_contents(&self, href: &str) -> Result<Vec<Material>> {
        let url = self.resolve(href)?;
        let page = self.get_page(&url).await?;
        Ok(parse_folder(&page.html))
    }

    /// Fetch the user's private files
    pub async fn private_files(&self) -> Result<Vec<Material>> {
        let page = self.get_endpoint(PRIVATE_FILES_PATH).await?;
        Ok(parse_private_files(&page.html))
    }
}
