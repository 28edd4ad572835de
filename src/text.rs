use aho_corasick::AhoCorasick;
use std::sync::OnceLock;

/// Substrings that mark a message as structured/query-style output which must
/// be rendered verbatim rather than through list markup.
const PREFORMATTED_SENTINELS: &[&str] = &[
    "Database error:",
    "Error executing query:",
    "Error getting schema:",
    "Total rows:",
    "ClickHouse",
    "MySQL",
    "Table:",
    "Available tables",
    "---",
];

fn sentinel_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::new(PREFORMATTED_SENTINELS).expect("sentinel patterns are valid")
    })
}

/// Coarse content sniff: anything that looks like tabular/query output, or any
/// multi-line text, is shown preformatted instead of list-processed.
pub fn looks_preformatted(content: &str) -> bool {
    if content.is_empty() {
        return false;
    }
    content.contains('\n') || sentinel_matcher().is_match(content)
}

/// Replace the five HTML-significant characters with their entity forms.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escape, then rewrite bullet/numbered runs into list markup.
pub fn render_markdownish(text: &str) -> String {
    render_lists(&escape_html(text))
}

fn unordered_item(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))?;
    Some(rest)
}

fn ordered_item(line: &str) -> Option<(u64, &str)> {
    let digits_end = line.find(|ch: char| !ch.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let rest = line[digits_end..].strip_prefix(". ")?;
    let number = line[..digits_end].parse::<u64>().ok()?;
    Some((number, rest))
}

/// Line-oriented list rewrite, not a markdown grammar. Consecutive bullet
/// lines of one kind form a single list; an ordered run that skips a number
/// closes the list and opens a new one starting at the new number.
pub fn render_lists(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_unordered = false;
    let mut in_ordered = false;
    let mut ordered_cursor = 0u64;

    for line in text.split('\n') {
        if let Some(item) = unordered_item(line) {
            if in_ordered {
                out.push("</ol>".to_string());
                in_ordered = false;
                ordered_cursor = 0;
            }
            if !in_unordered {
                in_unordered = true;
                out.push("<ul>".to_string());
            }
            out.push(format!("<li>{item}</li>"));
            continue;
        }

        if let Some((number, item)) = ordered_item(line) {
            if in_unordered {
                out.push("</ul>".to_string());
                in_unordered = false;
            }
            if !in_ordered {
                in_ordered = true;
                ordered_cursor = number;
                out.push(format!("<ol start=\"{number}\">"));
            } else if ordered_cursor.checked_add(1) != Some(number) {
                // Skipped number: close the run and restart at the new one.
                out.push("</ol>".to_string());
                out.push(format!("<ol start=\"{number}\">"));
            }
            out.push(format!("<li>{item}</li>"));
            ordered_cursor = number;
            continue;
        }

        if in_unordered {
            out.push("</ul>".to_string());
            in_unordered = false;
        }
        if in_ordered {
            out.push("</ol>".to_string());
            in_ordered = false;
            ordered_cursor = 0;
        }
        out.push(line.to_string());
    }

    if in_unordered {
        out.push("</ul>".to_string());
    }
    if in_ordered {
        out.push("</ol>".to_string());
    }

    out.join("\n")
}

/// Strip leading/trailing blank lines and collapse runs of blank lines to one.
pub fn strip_extra_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    let first = lines.iter().position(|line| !line.trim().is_empty());
    let Some(first) = first else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);

    let mut out: Vec<&str> = Vec::with_capacity(last - first + 1);
    let mut previous_blank = false;
    for line in &lines[first..=last] {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push(line);
        previous_blank = blank;
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_covers_all_entities() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_looks_preformatted_on_sentinels_and_newlines() {
        assert!(looks_preformatted("Total rows: 12"));
        assert!(looks_preformatted("a ClickHouse cluster"));
        assert!(looks_preformatted("line one\nline two"));
        assert!(!looks_preformatted("just a sentence"));
        assert!(!looks_preformatted(""));
    }

    #[test]
    fn test_render_lists_groups_mixed_kinds() {
        let rendered = render_lists("- a\n- b\nplain\n1. x\n2. y");
        assert_eq!(
            rendered,
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\nplain\n<ol start=\"1\">\n<li>x</li>\n<li>y</li>\n</ol>"
        );
    }

    #[test]
    fn test_render_lists_restarts_on_skipped_number() {
        let rendered = render_lists("1. x\n3. y");
        assert_eq!(
            rendered,
            "<ol start=\"1\">\n<li>x</li>\n</ol>\n<ol start=\"3\">\n<li>y</li>\n</ol>"
        );
    }

    #[test]
    fn test_render_lists_handles_max_item_number() {
        let rendered = render_lists("18446744073709551615. a\n1. b");
        assert_eq!(
            rendered,
            "<ol start=\"18446744073709551615\">\n<li>a</li>\n</ol>\n<ol start=\"1\">\n<li>b</li>\n</ol>"
        );
    }

    #[test]
    fn test_render_lists_switches_between_kinds() {
        let rendered = render_lists("1. x\n- a");
        assert_eq!(
            rendered,
            "<ol start=\"1\">\n<li>x</li>\n</ol>\n<ul>\n<li>a</li>\n</ul>"
        );
    }

    #[test]
    fn test_bullet_requires_trailing_space() {
        assert_eq!(render_lists("-not a bullet"), "-not a bullet");
        assert_eq!(render_lists("1.no space"), "1.no space");
    }

    #[test]
    fn test_strip_extra_blank_lines_trims_and_collapses() {
        assert_eq!(strip_extra_blank_lines("\n\na\n\n\n\nb\n\n"), "a\n\nb");
        assert_eq!(strip_extra_blank_lines("   \n\t\n"), "");
        assert_eq!(strip_extra_blank_lines("plain"), "plain");
    }

    #[test]
    fn test_strip_extra_blank_lines_is_idempotent() {
        let inputs = ["\n\na\n\n\nb\n", "a", "", "  \na\n  \n  \nb"];
        for input in inputs {
            let once = strip_extra_blank_lines(input);
            assert_eq!(strip_extra_blank_lines(&once), once);
        }
    }

    #[test]
    fn test_render_markdownish_escapes_before_list_rewrite() {
        let rendered = render_markdownish("- <b>bold</b>");
        assert_eq!(rendered, "<ul>\n<li>&lt;b&gt;bold&lt;/b&gt;</li>\n</ul>");
    }
}
