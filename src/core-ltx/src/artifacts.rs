//! Rendering of the two aggregate documents built from a job's changed pages:
//! the condensed `llms.txt` index and the `llms-full.txt` archive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Section name for pages that live at the site root.
pub const ROOT_SECTION: &str = "ROOT";

/// One changed page as fed to the renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPage {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    /// Cleaned markdown of the page.
    pub content: String,
}

impl ArtifactPage {
    /// The page title, falling back to its URL path.
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        match Url::parse(&self.url) {
            Ok(url) if url.path() != "/" => url.path().trim_matches('/').to_string(),
            Ok(url) => url.host_str().unwrap_or(&self.url).to_string(),
            Err(_) => self.url.clone(),
        }
    }

    /// Short text for the index entry: the LLM summary when there is one, else the description.
    fn blurb(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .or(self.description.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// First path segment of the URL, or [`ROOT_SECTION`].
pub fn section_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ROOT_SECTION.to_string()),
        Err(_) => ROOT_SECTION.to_string(),
    }
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Markdown anchor for a heading: lowercase, non-alphanumerics replaced by '-'.
pub fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// Root section first, then the others alphabetically.
fn group_by_section(pages: &[ArtifactPage]) -> Vec<(String, Vec<&ArtifactPage>)> {
    let mut sections: BTreeMap<String, Vec<&ArtifactPage>> = BTreeMap::new();
    for page in pages {
        sections.entry(section_of(&page.url)).or_default().push(page);
    }
    let root = sections.remove(ROOT_SECTION);
    let mut grouped: Vec<(String, Vec<&ArtifactPage>)> = Vec::with_capacity(sections.len() + 1);
    if let Some(root) = root {
        grouped.push((ROOT_SECTION.to_string(), root));
    }
    grouped.extend(sections);
    grouped
}

fn section_heading(section: &str) -> String {
    if section == ROOT_SECTION {
        "Home".to_string()
    } else {
        capitalize(section)
    }
}

/// Condensed index: a linked entry per page, grouped by first path segment.
pub fn render_index(site: &str, pages: &[ArtifactPage]) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", site));

    let root_description = pages
        .iter()
        .find(|p| section_of(&p.url) == ROOT_SECTION)
        .and_then(|p| p.description.clone())
        .unwrap_or_else(|| format!("Pages of {} that changed in the latest crawl.", site));
    output.push_str(&format!("> {}\n\n", root_description));

    for (section, pages) in group_by_section(pages) {
        output.push_str(&format!("## {}\n\n", section_heading(&section)));
        for page in pages {
            output.push_str(&format!("- [{}]({})", page.display_title(), page.url));
            if let Some(blurb) = page.blurb() {
                output.push_str(&format!(": {}", blurb));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    output
}

/// Full-content archive. A table of contents is added when there is more than one section.
pub fn render_full(site: &str, pages: &[ArtifactPage]) -> String {
    let grouped = group_by_section(pages);
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", site));

    if grouped.len() > 1 {
        output.push_str("## Table of Contents\n\n");
        for (section, _) in &grouped {
            let heading = section_heading(section);
            output.push_str(&format!("- [{}](#{})\n", heading, anchor(&heading)));
        }
        output.push('\n');
    }

    for (section, pages) in &grouped {
        output.push_str(&format!("## {}\n\n", section_heading(section)));
        for page in pages {
            output.push_str(&format!("### {}\n\n", page.display_title()));
            output.push_str(&format!("[{}]({})\n\n", page.url, page.url));
            if let Some(desc) = page.description.as_deref().filter(|d| !d.trim().is_empty()) {
                output.push_str(&format!("> {}\n\n", desc.trim()));
            }
            output.push_str(page.content.trim());
            output.push_str("\n\n---\n\n");
        }
    }

    output
}
