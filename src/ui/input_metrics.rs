use unicode_width::UnicodeWidthChar;

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

/// Wrap the input buffer into display rows of at most `width` columns,
/// breaking on explicit newlines and on width overflow.
pub fn wrap_input_lines(input: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut current_width = 0usize;

    for ch in input.chars() {
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            lines.push(String::new());
            current_width = 0;
            continue;
        }
        let ch_width = char_display_width(ch);
        if current_width + ch_width > width && current_width > 0 {
            lines.push(String::new());
            current_width = 0;
        }
        if let Some(line) = lines.last_mut() {
            line.push(ch);
        }
        current_width += ch_width;
    }

    lines
}

/// Row/column of the cursor within the wrapped input, for terminal cursor
/// placement.
pub fn cursor_row_col(input: &str, cursor_byte: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let cursor_byte = clamp_to_char_boundary_left(input, cursor_byte);
    let mut row = 0usize;
    let mut col = 0usize;

    for (idx, ch) in input.char_indices() {
        if idx >= cursor_byte {
            break;
        }
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            row += 1;
            col = 0;
            continue;
        }
        let ch_width = char_display_width(ch);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }

    if col >= width {
        row += 1;
        col = 0;
    }

    (row, col)
}

pub fn truncate_to_display_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width && used > 0 {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out
}

pub fn clamp_to_char_boundary_left(input: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(input.len());
    while cursor > 0 && !input.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_honors_explicit_newlines_and_width() {
        assert_eq!(wrap_input_lines("ab\ncd", 10), vec!["ab", "cd"]);
        assert_eq!(wrap_input_lines("abcd", 2), vec!["ab", "cd"]);
        assert_eq!(wrap_input_lines("", 4), vec![""]);
    }

    #[test]
    fn test_wide_characters_count_double() {
        assert_eq!(display_width("你好"), 4);
        assert_eq!(wrap_input_lines("你好", 2), vec!["你", "好"]);
    }

    #[test]
    fn test_cursor_row_col_tracks_wrapping() {
        assert_eq!(cursor_row_col("abcd", 4, 2), (2, 0));
        assert_eq!(cursor_row_col("a\nb", 2, 10), (1, 0));
    }

    #[test]
    fn test_clamp_to_char_boundary_left() {
        let text = "a你b";
        // Byte 2 is inside the multi-byte char starting at byte 1.
        assert_eq!(clamp_to_char_boundary_left(text, 2), 1);
        assert_eq!(clamp_to_char_boundary_left(text, 99), text.len());
    }

    #[test]
    fn test_truncate_to_display_width() {
        assert_eq!(truncate_to_display_width("abcdef", 3), "abc");
        assert_eq!(truncate_to_display_width("你好吗", 4), "你好");
    }
}
