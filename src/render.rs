use std::path::{Path, PathBuf};

use pulldown_cmark::{html, Options, Parser};
use pulldown_cmark_escape::escape_html;
use tokio::fs;
use tracing::{info, warn};

use crate::command::ToolCommand;
use crate::error::{ArticleError, Result};

const TEMPLATE: &str = include_str!("templates/article.html");

/// Joins the article and its review in the final document.
///
/// CommonMark needs the space after `#` for the line to become a heading.
pub const REVIEW_SEPARATOR: &str = "\n\n---\n# Review\n";

/// Final Markdown document: the article, followed by the review when there is one
pub fn assemble(article: &str, review: Option<&str>) -> String {
    match review {
        Some(review) => [article, review].join(REVIEW_SEPARATOR),
        None => article.to_string(),
    }
}

/// Markdown to an HTML fragment with tables and fenced code blocks
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);
    body
}

/// Full HTML page for `markdown` titled `title`
pub fn render_page(markdown: &str, title: &str) -> String {
    TEMPLATE
        .replace("{{title}}", &escape_title(title))
        .replace("{{content}}", &markdown_to_html(markdown))
}

fn escape_title(title: &str) -> String {
    let mut escaped = String::with_capacity(title.len());
    match escape_html(&mut escaped, title) {
        Ok(()) => escaped,
        Err(_) => unreachable!("writing to a String cannot fail"),
    }
}

/// Where the rendered page for `title` goes inside a working directory
pub fn output_path(work_dir: &Path, title: &str) -> PathBuf {
    let file_name = title.replace(['/', '\\'], "_");
    work_dir.join(format!("{}.html", file_name))
}

/// Render and write the page, returning its path
pub async fn write_page(work_dir: &Path, title: &str, markdown: &str) -> Result<PathBuf> {
    let path = output_path(work_dir, title);
    let page = render_page(markdown, title);

    fs::write(&path, page)
        .await
        .map_err(|e| ArticleError::Render(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Wrote {}", path.display());
    Ok(path)
}

fn viewer_command(path: &Path) -> ToolCommand {
    if cfg!(target_os = "macos") {
        ToolCommand::new("open", "Open in viewer").path(path)
    } else if cfg!(target_os = "windows") {
        ToolCommand::new("cmd", "Open in viewer")
            .args(["/C", "start", ""])
            .path(path)
    } else {
        ToolCommand::new("xdg-open", "Open in viewer").path(path)
    }
}

/// Hand the page to the desktop's default viewer. Never fails the run.
pub async fn open_in_viewer(path: &Path) {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    if let Err(e) = viewer_command(&path).execute(ArticleError::Render).await {
        warn!("Could not open {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble() {
        assert_eq!(assemble("# A", None), "# A");
        assert_eq!(assemble("# A", Some("Fine.")), "# A\n\n---\n# Review\nFine.");
    }

    #[test]
    fn test_review_gets_its_own_heading() {
        let html = markdown_to_html(&assemble("# Article\n\nBody.", Some("Looks fine.")));

        assert!(html.contains("<h1>Article</h1>"));
        assert!(html.contains("<hr />"));
        assert!(html.contains("<h1>Review</h1>"));
        assert!(html.contains("<p>Looks fine.</p>"));
        assert!(!html.contains("#Review"));
    }

    #[test]
    fn test_markdown_tables_and_fences() {
        let html = markdown_to_html(
            "| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n",
        );

        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_render_page_substitutes_placeholders() {
        let page = render_page("# Heading\n\nBody", "Q&A <live>");

        assert!(page.contains("<title>Q&amp;A &lt;live&gt;</title>"));
        assert!(page.contains("<h1>Heading</h1>"));
        assert!(!page.contains("{{title}}"));
        assert!(!page.contains("{{content}}"));
    }

    #[tokio::test]
    async fn test_write_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_page(dir.path(), "AC/DC live", "text").await.unwrap();

        assert_eq!(path, dir.path().join("AC_DC live.html"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("<p>text</p>"));
    }
}
