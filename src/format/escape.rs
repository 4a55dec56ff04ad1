//! Escaping of line breaks inside flat-file values
//!
//! Only `\n` and `\r` are encoded. A backslash already present in the input
//! is left alone, so a value holding a literal `\` followed by `n` or `r`
//! reads back as a line break. Existing cache files depend on this encoding,
//! so it is kept as is.

/// Replaces line feeds and carriage returns with `\n` and `\r`.
pub fn escape_returns(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Turns `\n` and `\r` sequences back into line feeds and carriage returns.
///
/// A backslash in last position is kept literally.
pub fn unescape_returns(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                    continue;
                }
                Some('r') => {
                    out.push('\r');
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    out
}
