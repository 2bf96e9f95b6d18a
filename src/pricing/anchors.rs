//! Locators for the statistics region of a release page.
//!
//! Each matcher is independent; the extractor tries them in priority order and
//! uses the first offset found. New markup variants get a new matcher instead
//! of changes to the extraction logic.

use regex::{Regex, RegexBuilder};
use std::fmt::Debug;

pub trait AnchorMatcher: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Byte offset where the statistics region starts, if this matcher recognizes it.
    fn find(&self, html: &str) -> Option<usize>;
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// A heading element (`h1`..`h6`) whose text starts with the given title,
/// possibly wrapped in inline markup.
#[derive(Debug)]
pub struct HeadingTextAnchor {
    title: String,
    pattern: Option<Regex>,
}

impl HeadingTextAnchor {
    pub fn new(title: &str) -> Self {
        let pattern = case_insensitive(&format!(
            r"<h[1-6][^>]*>(?:\s|<[^>]*>)*{}",
            regex::escape(title)
        ));
        Self {
            title: title.to_string(),
            pattern,
        }
    }
}

impl AnchorMatcher for HeadingTextAnchor {
    fn name(&self) -> &str {
        &self.title
    }

    fn find(&self, html: &str) -> Option<usize> {
        self.pattern.as_ref()?.find(html).map(|m| m.start())
    }
}

/// An element with exactly this `id` attribute.
#[derive(Debug)]
pub struct ElementIdAnchor {
    id: String,
    pattern: Option<Regex>,
}

impl ElementIdAnchor {
    pub fn new(id: &str) -> Self {
        let pattern = case_insensitive(&format!(
            r#"\bid\s*=\s*["']{}["']"#,
            regex::escape(id)
        ));
        Self {
            id: id.to_string(),
            pattern,
        }
    }
}

impl AnchorMatcher for ElementIdAnchor {
    fn name(&self) -> &str {
        &self.id
    }

    fn find(&self, html: &str) -> Option<usize> {
        self.pattern.as_ref()?.find(html).map(|m| m.start())
    }
}

/// An element whose `class` attribute contains the substring. Catches hashed
/// CSS-module names such as `statistics_1Xq2a`.
#[derive(Debug)]
pub struct ClassSubstringAnchor {
    needle: String,
    pattern: Option<Regex>,
}

impl ClassSubstringAnchor {
    pub fn new(needle: &str) -> Self {
        let pattern = case_insensitive(&format!(
            r#"\bclass\s*=\s*["'][^"']*{}[^"']*["']"#,
            regex::escape(needle)
        ));
        Self {
            needle: needle.to_string(),
            pattern,
        }
    }
}

impl AnchorMatcher for ClassSubstringAnchor {
    fn name(&self) -> &str {
        &self.needle
    }

    fn find(&self, html: &str) -> Option<usize> {
        self.pattern.as_ref()?.find(html).map(|m| m.start())
    }
}

/// Last resort: a bare text marker anywhere in the markup.
#[derive(Debug)]
pub struct TextAnchor {
    text: String,
    pattern: Option<Regex>,
}

impl TextAnchor {
    pub fn new(text: &str) -> Self {
        let pattern = case_insensitive(&regex::escape(text));
        Self {
            text: text.to_string(),
            pattern,
        }
    }
}

impl AnchorMatcher for TextAnchor {
    fn name(&self) -> &str {
        &self.text
    }

    fn find(&self, html: &str) -> Option<usize> {
        self.pattern.as_ref()?.find(html).map(|m| m.start())
    }
}

/// Matchers for the catalog's current and legacy release page layouts, most specific first.
pub fn default_anchors() -> Vec<Box<dyn AnchorMatcher>> {
    vec![
        Box::new(HeadingTextAnchor::new("Statistics")),
        Box::new(ElementIdAnchor::new("release-stats")),
        Box::new(ElementIdAnchor::new("statistics")),
        Box::new(ClassSubstringAnchor::new("statistics")),
        Box::new(ClassSubstringAnchor::new("release-stats")),
        Box::new(TextAnchor::new("Last Sold:")),
    ]
}
