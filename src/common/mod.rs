//! Common utilities shared by the runners, the session client and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Replace `${name}` placeholders using `lookup`
///
/// Unknown names are an error so that a typo in a suite file fails loudly
/// instead of sending a literal `${...}` to the device.
pub fn expand_vars<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::Config(format!("Unterminated variable in '{}'", input)))?;
        let name = after[..end].trim();
        let value = lookup(name).ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Cut `text` to at most `max_chars` characters
///
/// Returns the prefix and whether anything was removed. Counts chars, not
/// bytes, so multi-byte output from the device is never split mid-character.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "app_package" => Some("com.example.app".to_string()),
            "empty" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_vars() {
        assert_eq!(
            expand_vars("pm path ${app_package}", lookup).unwrap(),
            "pm path com.example.app"
        );
        assert_eq!(expand_vars("a${empty}b", lookup).unwrap(), "ab");
        assert_eq!(expand_vars("no vars", lookup).unwrap(), "no vars");
    }

    #[test]
    fn test_expand_vars_unknown() {
        let err = expand_vars("${nope}", lookup).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable(name) if name == "nope"));
    }

    #[test]
    fn test_expand_vars_unterminated() {
        assert!(expand_vars("${app_package", lookup).is_err());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), ("hello", false));
        assert_eq!(truncate_chars("hello", 5), ("hello", false));
        assert_eq!(truncate_chars("hello", 3), ("hel", true));
        assert_eq!(truncate_chars("ñandú", 2), ("ña", true));
    }
}
