//! Shell-style glob compilation shared by filtering and classification.
//!
//! Patterns follow classic `fnmatch` rules: `*` matches any run of
//! characters including `/`, `?` matches one character, `[...]` is a
//! character class. `**` is just two stars, not a recursive directory
//! match, and braces are literal.

use globset::{Glob, GlobBuilder, GlobMatcher};

/// Compile a single shell glob.
pub fn shell_glob(pattern: &str, case_insensitive: bool) -> Result<GlobMatcher, globset::Error> {
    build_glob(pattern, case_insensitive).map(|g| g.compile_matcher())
}

/// Build a [`Glob`] with `fnmatch` semantics, for use in a `GlobSet`.
pub fn build_glob(pattern: &str, case_insensitive: bool) -> Result<Glob, globset::Error> {
    GlobBuilder::new(&to_fnmatch_syntax(pattern))
        .literal_separator(false)
        .backslash_escape(false)
        .case_insensitive(case_insensitive)
        .build()
}

/// Rewrite a pattern so globset reads it the way `fnmatch` would.
///
/// Star runs collapse to one star and braces outside classes become
/// single-character classes.
fn to_fnmatch_syntax(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut prev_star = false;

    for c in pattern.chars() {
        if in_class {
            out.push(c);
            if c == ']' {
                in_class = false;
            }
            continue;
        }
        match c {
            '*' => {
                if !prev_star {
                    out.push('*');
                }
                prev_star = true;
                continue;
            }
            '[' => {
                in_class = true;
                out.push(c);
            }
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            _ => out.push(c),
        }
        prev_star = false;
    }
    out
}

/// Expand a leading `~` to the invoking user's home directory.
pub fn expand_home(pattern: &str) -> String {
    let rest = if pattern == "~" {
        ""
    } else if let Some(rest) = pattern.strip_prefix("~/") {
        rest
    } else {
        return pattern.to_string();
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home.to_string_lossy().into_owned(),
        Some(home) => home.join(rest).to_string_lossy().into_owned(),
        None => pattern.to_string(),
    }
}

/// Whether a pattern segment contains glob metacharacters.
pub fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}
