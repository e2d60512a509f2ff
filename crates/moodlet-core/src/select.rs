//! Ordered selector fallbacks
//!
//! Moodle themes disagree about markup, so most lookups try several
//! selectors or whole strategies in priority order and keep the first hit.

use scraper::{ElementRef, Selector};
use tracing::debug;

/// A pure extraction strategy over a document or subtree
pub type Strategy<T> = for<'a> fn(ElementRef<'a>) -> Option<T>;

/// Run strategies in order and return the first `Some`
pub fn first_some<T>(scope: ElementRef<'_>, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(scope))
}

/// `Some(items)` unless `items` is empty, so a strategy can defer to the next
pub fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Parse a selector literal
///
/// Only used with selectors written in this crate; an invalid one is a bug.
pub fn css(selector: &str) -> Selector {
    Selector::parse(selector)
        .unwrap_or_else(|e| panic!("invalid built-in selector {:?}: {:?}", selector, e))
}

/// First element matching the earliest selector in priority order
pub fn first_match<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        let found = scope.select(&selector).next();
        found
    })
}

/// Like [`first_match`], skipping elements whose trimmed text is empty
pub fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        let found = scope.select(&selector).map(text_of).find(|text| !text.is_empty());
        found
    })
}

/// All matches of the earliest selector that matches anything
pub fn first_non_empty<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            let found: Vec<_> = scope.select(&selector).collect();
            if !found.is_empty() {
                debug!("{} matches for selector: {}", found.len(), selector_str);
                return found;
            }
        }
    }
    Vec::new()
}

/// Trimmed text content of an element
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Value of `href`, empty when missing
pub fn href_of(element: ElementRef<'_>) -> &str {
    element.value().attr("href").unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_paragraph(scope: ElementRef<'_>) -> Option<String> {
        scope.select(&css("p")).next().map(text_of)
    }

    fn first_heading(scope: ElementRef<'_>) -> Option<String> {
        scope.select(&css("h1")).next().map(text_of)
    }

    #[test]
    fn test_first_some_respects_order() {
        let doc = Html::parse_document("<h1>Head</h1><p>Para</p>");
        let strategies: [Strategy<String>; 2] = [first_heading, first_paragraph];
        assert_eq!(first_some(doc.root_element(), &strategies), Some("Head".to_string()));

        let doc = Html::parse_document("<p>Para</p>");
        assert_eq!(first_some(doc.root_element(), &strategies), Some("Para".to_string()));
    }

    #[test]
    fn test_first_match_uses_priority_not_document_order() {
        let doc = Html::parse_document(r#"<span class="b">B</span><span class="a">A</span>"#);
        let found = first_match(doc.root_element(), &[".a", ".b"]).map(text_of);
        assert_eq!(found, Some("A".to_string()));
    }

    #[test]
    fn test_first_text_skips_empty() {
        let doc = Html::parse_document(r#"<span class="a">  </span><span class="b">Name</span>"#);
        assert_eq!(first_text(doc.root_element(), &[".a", ".b"]), Some("Name".to_string()));
    }

    #[test]
    fn test_first_non_empty() {
        let doc = Html::parse_document(r#"<div class="x"><a href="1">1</a><a href="2">2</a></div>"#);
        assert!(first_non_empty(doc.root_element(), &[".missing a"]).is_empty());
        assert_eq!(first_non_empty(doc.root_element(), &[".missing a", ".x a"]).len(), 2);
    }
}
