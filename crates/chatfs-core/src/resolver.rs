//! Path resolution and sandbox enforcement.
//!
//! Two incompatible conventions coexist by command family and are kept as two
//! named functions on purpose:
//!
//! - [`resolve_relative`] — mkdir, mv, cp, rm, save, convert, group. The
//!   operator path must NOT start with `/` and is joined onto the mount root.
//! - [`resolve_display`] — ls, trls, custom ls. The operator path MUST start
//!   with `/` (the virtual root), which is stripped before joining.
//!
//! Unifying them would change user-visible command syntax; see DESIGN.md.

use std::path::{Path, PathBuf};

use crate::error::{ChatFsError, Result};

/// Lexically normalize a relative path: drops `.` and empty segments, folds
/// `..` into its parent, and fails if `..` would climb above the root.
fn normalize(raw: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(ChatFsError::InvalidPath {
                        path: raw.to_string(),
                    });
                }
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Resolve an operator path for the relative-form command family.
///
/// A leading separator is a validation error; the resolved path always lies
/// strictly under `root`.
pub fn resolve_relative(root: &Path, raw: &str) -> Result<PathBuf> {
    if raw.is_empty() || raw.starts_with('/') {
        return Err(ChatFsError::InvalidPath {
            path: raw.to_string(),
        });
    }
    let rel = normalize(raw)?;
    if rel.is_empty() {
        return Err(ChatFsError::InvalidPath {
            path: raw.to_string(),
        });
    }
    Ok(root.join(rel))
}

/// Resolve an operator path for the absolute-display command family.
///
/// The leading separator denotes the virtual root and is required; `/` alone
/// resolves to the mount root itself.
pub fn resolve_display(root: &Path, raw: &str) -> Result<PathBuf> {
    if !raw.starts_with('/') {
        return Err(ChatFsError::InvalidPath {
            path: raw.to_string(),
        });
    }
    let rel = normalize(&raw[1..])?;
    if rel.is_empty() {
        Ok(root.to_path_buf())
    } else {
        Ok(root.join(rel))
    }
}

/// Split argument text into tokens. A token is either double-quoted (may
/// contain whitespace) or a bare run of non-whitespace characters.
pub fn split_args(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => token.push(ch),
                    None => {
                        return Err(ChatFsError::InvalidPath {
                            path: input.to_string(),
                        })
                    }
                }
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
            tokens.push(token);
        }
    }
    Ok(tokens)
}

/// Exactly one path argument; a second unexpected token is a validation error.
pub fn one_arg(input: &str) -> Result<String> {
    let mut tokens = split_args(input)?;
    if tokens.len() != 1 {
        return Err(ChatFsError::InvalidPath {
            path: input.to_string(),
        });
    }
    Ok(tokens.remove(0))
}

/// Exactly two path arguments.
pub fn two_args(input: &str) -> Result<(String, String)> {
    let mut tokens = split_args(input)?;
    if tokens.len() != 2 {
        return Err(ChatFsError::InvalidPath {
            path: input.to_string(),
        });
    }
    let second = tokens.remove(1);
    Ok((tokens.remove(0), second))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/mnt/box")
    }

    #[test]
    fn relative_joins_under_root() {
        let p = resolve_relative(&root(), "docs/a.txt").unwrap();
        assert_eq!(p, PathBuf::from("/mnt/box/docs/a.txt"));
    }

    #[test]
    fn relative_rejects_leading_separator() {
        assert!(matches!(
            resolve_relative(&root(), "/docs"),
            Err(ChatFsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn relative_rejects_escape() {
        assert!(resolve_relative(&root(), "../outside").is_err());
        assert!(resolve_relative(&root(), "a/../../outside").is_err());
        // `..` that stays inside the sandbox is fine
        let p = resolve_relative(&root(), "a/../b").unwrap();
        assert_eq!(p, PathBuf::from("/mnt/box/b"));
    }

    #[test]
    fn relative_rejects_empty_resolution() {
        assert!(resolve_relative(&root(), ".").is_err());
        assert!(resolve_relative(&root(), "a/..").is_err());
    }

    #[test]
    fn display_requires_leading_separator() {
        assert!(matches!(
            resolve_display(&root(), "docs"),
            Err(ChatFsError::InvalidPath { .. })
        ));
        let p = resolve_display(&root(), "/docs").unwrap();
        assert_eq!(p, PathBuf::from("/mnt/box/docs"));
    }

    #[test]
    fn display_root_alone() {
        assert_eq!(resolve_display(&root(), "/").unwrap(), root());
    }

    #[test]
    fn display_rejects_escape() {
        assert!(resolve_display(&root(), "/../outside").is_err());
        assert!(resolve_display(&root(), "/a/../../x").is_err());
    }

    #[test]
    fn quoted_tokens() {
        let tokens = split_args(r#""my file.txt" other"#).unwrap();
        assert_eq!(tokens, vec!["my file.txt", "other"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(split_args(r#""dangling"#).is_err());
    }

    #[test]
    fn one_arg_rejects_extra_token() {
        assert_eq!(one_arg("solo").unwrap(), "solo");
        assert_eq!(one_arg(r#""with space""#).unwrap(), "with space");
        assert!(one_arg("one two").is_err());
        assert!(one_arg("").is_err());
    }

    #[test]
    fn two_args_arity() {
        assert_eq!(
            two_args(r#"src "a dst""#).unwrap(),
            ("src".to_string(), "a dst".to_string())
        );
        assert!(two_args("only").is_err());
        assert!(two_args("a b c").is_err());
    }
}
