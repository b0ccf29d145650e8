//! String helpers behind `SPLIT` and `SEARCH`.

use regex::Regex;

use crate::types::EvalError;

/// Split `input` around matches of the regular expression `delimiter`.
///
/// A positive `limit` caps the number of parts and keeps trailing empty
/// parts. Without a limit, trailing empty parts are removed; an empty input
/// still yields a single empty part.
pub fn split(input: &str, delimiter: &str, limit: Option<usize>) -> Result<Vec<String>, EvalError> {
    let re = Regex::new(delimiter).map_err(|e| {
        EvalError::invalid_arguments(format!("Invalid split expression '{}': {}", delimiter, e))
    })?;
    if input.is_empty() {
        return Ok(vec![String::new()]);
    }

    let mut parts: Vec<String> = match limit {
        Some(n) if n > 0 => re.splitn(input, n).map(str::to_string).collect(),
        _ => re.split(input).map(str::to_string).collect(),
    };
    // A zero-width match at the very start does not produce a leading part
    if parts.len() > 1 && parts[0].is_empty() && re.find(input).is_some_and(|m| m.end() == 0) {
        parts.remove(0);
    }
    if !matches!(limit, Some(n) if n > 0) {
        while parts.len() > 1 && parts.last().is_some_and(String::is_empty) {
            parts.pop();
        }
        if parts.len() == 1 && parts[0].is_empty() {
            parts.clear();
        }
    }
    Ok(parts)
}

/// Character index of the first occurrence of `needle`, or -1.
pub fn search(haystack: &str, needle: &str, ignore_case: bool) -> i64 {
    let (hay, needle) = if ignore_case {
        (haystack.to_lowercase(), needle.to_lowercase())
    } else {
        (haystack.to_string(), needle.to_string())
    };
    match hay.find(&needle) {
        Some(byte) => hay[..byte].chars().count() as i64,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(input: &str, delimiter: &str, limit: Option<usize>) -> Vec<String> {
        split(input, delimiter, limit).unwrap()
    }

    #[test]
    fn split_basic() {
        assert_eq!(parts("a,b,c", ",", None), ["a", "b", "c"]);
        assert_eq!(parts("a, b ,c", "\\s*,\\s*", None), ["a", "b", "c"]);
    }

    #[test]
    fn split_drops_trailing_empties() {
        assert_eq!(parts("a,b,,", ",", None), ["a", "b"]);
        assert_eq!(parts(",a", ",", None), ["", "a"]);
        assert!(parts(",,", ",", None).is_empty());
    }

    #[test]
    fn split_empty_input() {
        assert_eq!(parts("", ",", None), [""]);
    }

    #[test]
    fn split_with_limit() {
        assert_eq!(parts("a,b,c", ",", Some(2)), ["a", "b,c"]);
        assert_eq!(parts("a,b,,", ",", Some(4)), ["a", "b", "", ""]);
    }

    #[test]
    fn split_bad_pattern() {
        assert!(split("a", "(", None).is_err());
    }

    #[test]
    fn search_positions() {
        assert_eq!(search("hello world", "world", false), 6);
        assert_eq!(search("hello world", "World", false), -1);
        assert_eq!(search("hello world", "World", true), 6);
        assert_eq!(search("héllo", "llo", false), 2);
    }
}
