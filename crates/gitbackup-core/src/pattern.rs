//! Ignore-style pattern matching.
//!
//! A [`Pattern`] is compiled once from a single pattern line and then tested
//! against normalized relative paths (forward slashes, no leading `./`).
//!
//! Supported syntax:
//!
//! - `dir/` - directory pattern; matches the directory itself and anything
//!   below it, at any depth (`node_modules/` matches `src/node_modules/x`)
//! - `name` - no slash; matches the final path segment at any depth
//! - `/name` or `a/b` - anchored to the source root
//! - `**/`, `/**`, `**` - zero or more path segments
//! - `*` - any run of characters except `/`
//! - `?` - exactly one character except `/`
//! - `[...]` - character class, `[!...]` negated
//!
//! Matching is case-insensitive. A pattern that cannot be compiled falls
//! back to a plain containment check against its literal text.

use std::borrow::Cow;
use std::fmt;

use regex::{Regex, RegexBuilder};
use tracing::debug;

/// A compiled ignore-style pattern.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    matcher: Matcher,
}

#[derive(Clone)]
enum Matcher {
    Regex(Regex),
    /// Lowercased literal used when the pattern does not compile.
    Literal(String),
}

impl Pattern {
    /// Compiles a single pattern.
    ///
    /// Compilation never fails: patterns the regex engine rejects degrade to
    /// a literal containment check.
    pub fn compile(pattern: &str) -> Self {
        let source = pattern.to_string();

        let compiled = translate(pattern)
            .map(|src| RegexBuilder::new(&src).case_insensitive(true).build());

        let matcher = match compiled {
            Some(Ok(regex)) => Matcher::Regex(regex),
            Some(Err(e)) => {
                debug!("Pattern {:?} did not compile ({}), using literal match", pattern, e);
                Matcher::Literal(literal_text(pattern))
            },
            None => Matcher::Literal(literal_text(pattern)),
        };

        Self { source, matcher }
    }

    /// Returns the pattern text this matcher was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern is using the literal fallback.
    pub fn is_literal_fallback(&self) -> bool {
        matches!(self.matcher, Matcher::Literal(_))
    }

    /// Tests the pattern against a relative path.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);

        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(&path),
            // Suffix matches are a special case of containment.
            Matcher::Literal(literal) => {
                !literal.is_empty() && path.to_lowercase().contains(literal.as_str())
            },
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("literal_fallback", &self.is_literal_fallback())
            .finish()
    }
}

/// Compiles `pattern` and tests it against `path` in one step.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    Pattern::compile(pattern).matches(path)
}

/// Normalizes a relative path for matching: backslashes become `/` and any
/// leading `./` or `/` is removed.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let path: Cow<'_, str> = if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    };

    let trimmed = {
        let mut p: &str = &path;
        loop {
            if let Some(rest) = p.strip_prefix("./") {
                p = rest;
            } else if let Some(rest) = p.strip_prefix('/') {
                p = rest;
            } else {
                break;
            }
        }
        p.len()
    };

    if trimmed == path.len() {
        path
    } else {
        let start = path.len() - trimmed;
        Cow::Owned(path[start..].to_string())
    }
}

fn literal_text(pattern: &str) -> String {
    pattern.trim_matches('/').to_lowercase()
}

/// Translates an ignore pattern into regex source, or `None` when there is
/// nothing left to match after stripping slashes.
fn translate(pattern: &str) -> Option<String> {
    let (dir_only, body) = match pattern.strip_suffix('/') {
        Some(body) => (true, body),
        None => (false, pattern),
    };
    let (rooted, body) = match body.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, body),
    };

    if body.is_empty() {
        return None;
    }

    let glob = glob_to_regex(body);

    let src = if dir_only {
        if rooted {
            format!("^(?:{glob})(?:/|$)")
        } else {
            format!("^(?:{glob})(?:/|$)|/(?:{glob})/")
        }
    } else if rooted || body.contains('/') {
        format!("^(?:{glob})(?:/|$)")
    } else {
        format!("(?:^|/)(?:{glob})$")
    };

    Some(src)
}

fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let mut end = i;
                while end < chars.len() && chars[end] == '*' {
                    end += 1;
                }
                let segment_start = i == 0 || chars[i - 1] == '/';

                if segment_start && chars.get(end) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i = end + 1;
                } else {
                    out.push_str(".*");
                    i = end;
                }
            },
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            },
            '?' => {
                out.push_str("[^/]");
                i += 1;
            },
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end + 1;
                },
                None => {
                    out.push_str("\\[");
                    i += 1;
                },
            },
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            },
        }
    }

    out
}

/// Finds the closing `]` of a class opened at `open`.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    (i..chars.len()).find(|&j| chars[j] == ']')
}

fn push_class(out: &mut String, body: &[char]) {
    out.push('[');
    let mut rest = body;
    if let Some((first, tail)) = rest.split_first()
        && matches!(*first, '!' | '^')
    {
        out.push('^');
        rest = tail;
    }
    for &c in rest {
        if matches!(c, '\\' | '[' | '&' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(']');
}
