//! Text-level helpers shared by the extractors: comment stripping, bracket
//! matching and member splitting.

use once_cell::sync::Lazy;
use regex::Regex;

/// Remove `//`, `/* */` and `<!-- -->` comments outside string literals.
///
/// Line comments keep their newline and block comments become one space, so
/// tokens on either side never merge. `'` and `"` strings end at a newline;
/// stray apostrophes in JSX text cannot swallow the rest of the file.
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<u8> = None;
    let mut i = 0;
    let mut copied_from = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q || (b == b'\n' && q != b'`') {
                quote = None;
            }
            i += 1;
            continue;
        }

        let skip_to = match b {
            b'"' | b'\'' | b'`' => {
                quote = Some(b);
                None
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                Some((end, ""))
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                Some((end, " "))
            }
            b'<' if text[i..].starts_with("<!--") => {
                let end = text[i + 4..].find("-->").map_or(bytes.len(), |n| i + 4 + n + 3);
                Some((end, " "))
            }
            _ => None,
        };

        match skip_to {
            Some((end, replacement)) => {
                out.push_str(&text[copied_from..i]);
                out.push_str(replacement);
                i = end;
                copied_from = end;
            }
            None => i += 1,
        }
    }
    out.push_str(&text[copied_from.min(text.len())..]);
    out
}

/// Index of the bracket closing the one at `open`, skipping string literals.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (open_ch, close_ch) = match bytes.get(open)? {
        b'{' => (b'{', b'}'),
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        b'<' => (b'<', b'>'),
        _ => return None,
    };
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else if matches!(b, b'"' | b'\'' | b'`') {
            quote = Some(b);
        } else if b == open_ch {
            depth += 1;
        } else if b == close_ch && !(close_ch == b'>' && i > 0 && bytes[i - 1] == b'=') {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Text between the bracket at `open` and its match.
pub fn bracket_body(text: &str, open: usize) -> Option<&str> {
    matching_close(text, open).map(|close| &text[open + 1..close])
}

static MEMBER_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:readonly\s+)?(?:\(|['"]?[A-Za-z_$][\w$-]*['"]?\??\s*[:(])"#)
        .expect("valid regex")
});

/// Split an object type body into members.
///
/// `;` and `,` always separate at the top level; a newline separates only
/// when the next line starts a new member, so multi-line unions stay whole.
pub fn split_members(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (idx, ch) in body.char_indices() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            '>' => {
                if !current.ends_with('=') {
                    depth -= 1;
                }
                current.push(ch);
            }
            ';' | ',' if depth <= 0 => parts.push(std::mem::take(&mut current)),
            '\n' if depth <= 0 && MEMBER_START.is_match(&body[idx + 1..]) => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
