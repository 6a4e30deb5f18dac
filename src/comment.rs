use colored::Colorize;

use crate::generate::prompt::truncate_chars;
use crate::github::IssueComment;

/// GitHub rejects issue comments longer than this.
pub const MAX_COMMENT_CHARS: usize = 65_536;
/// Caption bound applied at composition time.
pub const MAX_CAPTION_CHARS: usize = 500;
pub const IMAGE_UNAVAILABLE: &str = "_(image unavailable)_";

/// True if any existing comment carries the hidden marker.
pub fn already_commented(comments: &[IssueComment], marker: &str) -> bool {
    comments
        .iter()
        .filter_map(|c| c.body.as_deref())
        .any(|body| body.contains(marker))
}

/// Assemble the comment body:
///
/// ```text
/// <!-- marker -->
/// > caption
///
/// ![PR cartoon](url)        or  _(image unavailable)_
///
/// attribution
/// ```
pub fn compose(marker: &str, caption: &str, image_url: Option<&str>, attribution: &str) -> String {
    let mut body = String::new();
    body.push_str(marker);
    body.push('\n');

    // Multi-line captions would escape the blockquote.
    let caption = caption.split_whitespace().collect::<Vec<_>>().join(" ");
    if !caption.is_empty() {
        body.push_str("> ");
        body.push_str(&truncate_chars(&caption, MAX_CAPTION_CHARS));
        body.push('\n');
    }
    body.push('\n');

    match image_url {
        Some(url) => body.push_str(&format!("![PR cartoon]({url})")),
        None => body.push_str(IMAGE_UNAVAILABLE),
    }
    body.push_str("\n\n");
    body.push_str(attribution);
    body.push('\n');

    truncate_chars(&body, MAX_COMMENT_CHARS)
}

/// Print a composed comment for --dry-run.
pub fn print_preview(body: &str) {
    println!();
    println!("{}", "═══ Comment preview (dry run, not posted) ═══".cyan().bold());
    println!("{body}");
    println!("{}", "═══ End of preview ═══".cyan().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "<!-- pr-cartoonist -->";

    fn comment(body: Option<&str>) -> IssueComment {
        IssueComment {
            id: 1,
            body: body.map(str::to_string),
            html_url: None,
        }
    }

    #[test]
    fn test_marker_detected() {
        let comments = vec![
            comment(Some("LGTM")),
            comment(None),
            comment(Some("<!-- pr-cartoonist -->\n> old caption")),
        ];
        assert!(already_commented(&comments, MARKER));
    }

    #[test]
    fn test_marker_absent() {
        let comments = vec![comment(Some("LGTM")), comment(None)];
        assert!(!already_commented(&comments, MARKER));
        assert!(!already_commented(&[], MARKER));
    }

    #[test]
    fn test_compose_with_caption_and_image() {
        let body = compose(
            MARKER,
            "meow-ge requests",
            Some("https://img.example/cat.png"),
            "footer",
        );
        assert!(body.starts_with(MARKER));
        assert!(body.contains("> meow-ge requests"));
        assert!(body.contains("![PR cartoon](https://img.example/cat.png)"));
        assert!(body.trim_end().ends_with("footer"));
    }

    #[test]
    fn test_compose_without_caption_or_image() {
        let body = compose(MARKER, "  ", None, "footer");
        assert!(!body.contains("> "));
        assert!(body.contains(IMAGE_UNAVAILABLE));
    }

    #[test]
    fn test_compose_flattens_multiline_caption() {
        let body = compose(MARKER, "line one\nline two", None, "footer");
        assert!(body.contains("> line one line two"));
    }

    #[test]
    fn test_compose_bounds_caption_and_body() {
        let body = compose(MARKER, &"c".repeat(2000), None, "footer");
        assert!(body.contains(&"c".repeat(MAX_CAPTION_CHARS)));
        assert!(!body.contains(&"c".repeat(MAX_CAPTION_CHARS + 1)));

        let huge = compose(MARKER, "cap", None, &"f".repeat(100_000));
        assert_eq!(huge.chars().count(), MAX_COMMENT_CHARS);
        assert!(huge.starts_with(MARKER));
    }

    #[test]
    fn test_preview_does_not_panic() {
        print_preview(&compose(MARKER, "cap", None, "footer"));
    }
}
