//! SQL `LIKE ... ESCAPE` matching.
//!
//! Operates over `char`s rather than bytes so a multi-byte escape
//! character (e.g. a non-ASCII character chosen as the escape) still
//! escapes exactly the next pattern character, not the next byte.

use common::{DbError, DbResult};

/// Matches `text` against `pattern`, where `%` matches any run of zero or
/// more characters and `_` matches exactly one character. If `escape` is
/// set, it must precede `%`, `_`, or itself in the pattern to be taken
/// literally; any other character following an escape is a format error,
/// and a trailing escape with nothing to escape is also a format error.
pub fn sql_like(text: &str, pattern: &str, escape: Option<char>) -> DbResult<bool> {
    let t: Vec<char> = text.chars().collect();
    let p = parse_pattern(pattern, escape)?;
    Ok(matches(&t, &p))
}

enum Tok {
    Any,        // %
    One,        // _
    Lit(char),  // literal char, possibly escaped
}

fn parse_pattern(pattern: &str, escape: Option<char>) -> DbResult<Vec<Tok>> {
    let mut out = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(next) if next == '%' || next == '_' || Some(next) == escape => {
                    out.push(Tok::Lit(next));
                }
                Some(other) => {
                    return Err(DbError::Expression(format!(
                        "LIKE escape character cannot precede '{other}'"
                    )));
                }
                None => {
                    return Err(DbError::Expression(
                        "LIKE pattern ends with a dangling escape character".into(),
                    ));
                }
            }
        } else if c == '%' {
            out.push(Tok::Any);
        } else if c == '_' {
            out.push(Tok::One);
        } else {
            out.push(Tok::Lit(c));
        }
    }
    Ok(out)
}

fn matches(text: &[char], pattern: &[Tok]) -> bool {
    // classic DP over text position x pattern position
    let n = text.len();
    let m = pattern.len();
    let mut dp = vec![vec![false; m + 1]; n + 1];
    dp[0][0] = true;
    for j in 0..m {
        if let Tok::Any = pattern[j] {
            dp[0][j + 1] = dp[0][j];
        }
    }
    for i in 0..n {
        for j in 0..m {
            dp[i + 1][j + 1] = match pattern[j] {
                Tok::Any => dp[i][j + 1] || dp[i + 1][j],
                Tok::One => dp[i][j],
                Tok::Lit(c) => dp[i][j] && text[i] == c,
            };
        }
    }
    dp[n][m]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_matches_any_run() {
        assert!(sql_like("hello world", "hello%", None).unwrap());
        assert!(sql_like("hello", "h%o", None).unwrap());
        assert!(!sql_like("hello", "h%z", None).unwrap());
    }

    #[test]
    fn underscore_matches_exactly_one() {
        assert!(sql_like("cat", "c_t", None).unwrap());
        assert!(!sql_like("ct", "c_t", None).unwrap());
    }

    #[test]
    fn escape_makes_wildcard_literal() {
        assert!(sql_like("50%", "50\\%", Some('\\')).unwrap());
        assert!(!sql_like("50x", "50\\%", Some('\\')).unwrap());
    }

    #[test]
    fn multi_byte_escape_character() {
        // use a multi-byte escape char (not ASCII) to escape a wildcard
        assert!(sql_like("100%", "100§%", Some('§')).unwrap());
        assert!(!sql_like("100x", "100§%", Some('§')).unwrap());
    }

    #[test]
    fn dangling_escape_is_format_error() {
        assert!(sql_like("abc", "abc\\", Some('\\')).is_err());
    }

    #[test]
    fn escape_before_non_wildcard_is_format_error() {
        assert!(sql_like("abc", "a\\bc", Some('\\')).is_err());
    }
}
