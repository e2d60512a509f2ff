//! Enrolled course discovery on the dashboard

use crate::auth::{is_login_url, DASHBOARD_PATH};
use crate::select::{self, css, Strategy};
use crate::session::Session;
use crate::{Course, MoodleError, Result};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};

const COURSE_LINK: &str = r#"a[href*="/course/view.php"]"#;

const CARD_SELECTOR: &str = ".dashboard-card, .course-summaryitem, .coursebox, .card";

const CARD_TITLE_SELECTORS: &[&str] = &[".coursename", ".fullname", "h3", "h4", "h5"];

const NAV_BLOCK_LINKS: &str = r#".block_navigation .type_course a[href*="/course/view.php"]"#;

const USER_MENU_LINKS: &str = r#".dropdown-menu a[href*="/course/view.php"]"#;

const FRONT_PAGE_BOXES: &str = ".frontpage-course-list-enrolled .coursebox";

/// The site front page is course 1 and never an enrolment
const SITE_HOME_ID: &str = "1";

fn course_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"id=(\d+)").expect("course id pattern"))
}

/// Numeric `id=` parameter of a course link
pub fn course_id(href: &str) -> Option<String> {
    course_id_pattern()
        .captures(href)
        .map(|caps| caps[1].to_string())
}

/// Collects courses in document order, unique by id
#[derive(Default)]
struct CourseCollector {
    seen: HashSet<String>,
    courses: Vec<Course>,
}

impl CourseCollector {
    fn is_new(&self, id: &str) -> bool {
        id != SITE_HOME_ID && !self.seen.contains(id)
    }

    fn push(&mut self, id: String, name: String) {
        if name.is_empty() || !self.is_new(&id) {
            return;
        }
        self.seen.insert(id.clone());
        self.courses.push(Course { id, name });
    }

    /// Add every course link using its own text as the name
    fn push_links<'a>(&mut self, links: impl Iterator<Item = ElementRef<'a>>) {
        for link in links {
            if let Some(id) = course_id(select::href_of(link)) {
                self.push(id, select::text_of(link));
            }
        }
    }

    fn finish(self) -> Option<Vec<Course>> {
        select::non_empty(self.courses)
    }
}

/// Dashboard and "My courses" cards
fn from_cards(root: ElementRef<'_>) -> Option<Vec<Course>> {
    let link_selector = css(COURSE_LINK);
    let mut collector = CourseCollector::default();

    for card in root.select(&css(CARD_SELECTOR)) {
        let Some(anchor) = card.select(&link_selector).next() else {
            continue;
        };
        let Some(id) = course_id(select::href_of(anchor)) else {
            continue;
        };
        if !collector.is_new(&id) {
            continue;
        }

        let name = select::first_match(card, CARD_TITLE_SELECTORS)
            .map(select::text_of)
            .unwrap_or_else(|| select::text_of(anchor));
        // Card themes sometimes label the link with the bare word
        if name.eq_ignore_ascii_case("course") {
            continue;
        }
        collector.push(id, name);
    }

    collector.finish()
}

/// Classic navigation block in the side panel
fn from_navigation_block(root: ElementRef<'_>) -> Option<Vec<Course>> {
    let mut collector = CourseCollector::default();
    collector.push_links(root.select(&css(NAV_BLOCK_LINKS)));
    collector.finish()
}

/// "My courses" dropdown in the top navigation
fn from_user_menu(root: ElementRef<'_>) -> Option<Vec<Course>> {
    let mut collector = CourseCollector::default();
    collector.push_links(root.select(&css(USER_MENU_LINKS)));
    collector.finish()
}

/// Enrolled course list on the site front page
fn from_front_page(root: ElementRef<'_>) -> Option<Vec<Course>> {
    let link_selector = css(COURSE_LINK);
    let mut collector = CourseCollector::default();

    for course_box in root.select(&css(FRONT_PAGE_BOXES)) {
        for link in course_box.select(&link_selector) {
            if let Some(id) = course_id(select::href_of(link)) {
                let name = select::first_match(course_box, &["h3", ".coursename"])
                    .map(select::text_of)
                    .unwrap_or_else(|| select::text_of(link));
                collector.push(id, name);
            }
        }
    }

    collector.finish()
}

/// Enrolled courses on a dashboard page, in document order
pub fn parse_courses(html: &str) -> Vec<Course> {
    let document = Html::parse_document(html);
    let strategies: [Strategy<Vec<Course>>; 4] = [
        from_cards,
        from_navigation_block,
        from_user_menu,
        from_front_page,
    ];
    let courses = select::first_some(document.root_element(), &strategies).unwrap_or_default();
    debug!("Parsed {} courses", courses.len());
    courses
}

impl Session {
    /// List the user's enrolled courses from the dashboard
    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        let dashboard = self.get_endpoint(DASHBOARD_PATH).await?;
        if is_login_url(&dashboard.url) {
            return Err(MoodleError::NotLoggedIn);
        }
        let courses = parse_courses(&dashboard.html);
        info!("Found {} courses", courses.len());
        Ok(courses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARDS: &str = r#"
        <div class="dashboard-card">
            <a href="https://m.edu/course/view.php?id=12">
                <span class="coursename"> Operating Systems </span>
            </a>
        </div>
        <div class="card">
            <a href="https://m.edu/course/view.php?id=1">Site home</a>
        </div>
        <div class="coursebox">
            <h3>Compilers</h3>
            <a href="https://m.edu/course/view.php?id=15">Enter</a>
        </div>
        <div class="card">
            <a href="https://m.edu/course/view.php?id=12">Operating Systems again</a>
        </div>
        <div class="card">
            <a href="https://m.edu/course/view.php?id=20">Course</a>
        </div>
    "#;

    #[test]
    fn test_course_id() {
        assert_eq!(course_id("/course/view.php?id=42"), Some("42".to_string()));
        assert_eq!(course_id("/course/view.php?section=2"), None);
    }

    #[test]
    fn test_parse_cards() {
        let courses = parse_courses(CARDS);
        assert_eq!(
            courses,
            vec![
                Course { id: "12".to_string(), name: "Operating Systems".to_string() },
                Course { id: "15".to_string(), name: "Compilers".to_string() },
            ]
        );
    }

    #[test]
    fn test_nav_block_fallback() {
        let html = r#"
            <div class="block_navigation">
                <ul>
                    <li class="type_course"><a href="/course/view.php?id=1">Home</a></li>
                    <li class="type_course"><a href="/course/view.php?id=7">Databases</a></li>
                    <li class="type_course"><a href="/course/view.php?id=8">Networks</a></li>
                    <li class="type_course"><a href="/course/view.php?id=7">Databases</a></li>
                </ul>
            </div>
        "#;
        let courses = parse_courses(html);
        assert_eq!(
            courses,
            vec![
                Course { id: "7".to_string(), name: "Databases".to_string() },
                Course { id: "8".to_string(), name: "Networks".to_string() },
            ]
        );
    }

    #[test]
    fn test_cards_win_over_nav_block() {
        let html = format!(
            r#"{}<div class="block_navigation"><p class="type_course"><a href="/course/view.php?id=99">Other</a></p></div>"#,
            CARDS
        );
        let ids: Vec<_> = parse_courses(&html).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["12", "15"]);
    }

    #[test]
    fn test_user_menu_fallback() {
        let html = r#"
            <ul class="dropdown-menu">
                <li><a href="/course/view.php?id=31">Algebra</a></li>
            </ul>
        "#;
        assert_eq!(
            parse_courses(html),
            vec![Course { id: "31".to_string(), name: "Algebra".to_string() }]
        );
    }

    #[test]
    fn test_front_page_fallback() {
        // The card strategy only looks at a box's first course link
        let html = r#"
            <div class="frontpage-course-list-enrolled">
                <section class="coursebox">
                    <h3>Statistics</h3>
                    <a href="/course/view.php?id=1">Home</a>
                    <a href="/course/view.php?id=44">Enter course</a>
                </section>
            </div>
        "#;
        assert_eq!(
            parse_courses(html),
            vec![Course { id: "44".to_string(), name: "Statistics".to_string() }]
        );
    }

    #[test]
    fn test_site_home_never_listed() {
        let html = r#"
            <div class="card"><a href="/course/view.php?id=1">Home</a></div>
            <div class="block_navigation"><p class="type_course"><a href="/course/view.php?id=1">Home</a></p></div>
        "#;
        assert!(parse_courses(html).is_empty());
    }

    #[test]
    fn test_no_courses() {
        assert!(parse_courses("<html><body></body></html>").is_empty());
    }
}
