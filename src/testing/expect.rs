//! Output expectations
//!
//! Substring checks applied to whatever a step produced. Command sentinels
//! (`ERROR: ...`) are ordinary text here, so a timeout fails an `absent`
//! check on "Error" just as a stack trace would.

use serde::Deserialize;

use crate::common::{truncate_chars, Error, Result};
use crate::exec::ERROR_PREFIX;

const EXCERPT_CHARS: usize = 200;

/// Checks on a step's output; every field set must hold
#[derive(Deserialize, Debug, Default, Clone)]
pub struct Expectation {
    /// Output must contain this substring
    pub contains: Option<String>,
    /// Output must contain at least one of these
    #[serde(default)]
    pub contains_any: Vec<String>,
    /// Output must contain none of these (case-sensitive)
    #[serde(default)]
    pub absent: Vec<String>,
    /// Output must contain none of these, ignoring case
    #[serde(default)]
    pub absent_ci: Vec<String>,
    /// Trimmed output must equal this
    pub equals: Option<String>,
    /// Output must not be blank
    #[serde(default)]
    pub non_empty: bool,
    /// Output must not be a command sentinel
    #[serde(default)]
    pub not_error: bool,
    /// Output parsed as a count must be at least this
    pub min_count: Option<usize>,
}

impl Expectation {
    pub fn check(&self, output: &str) -> Result<()> {
        if self.not_error && output.starts_with(ERROR_PREFIX) {
            return Err(fail(format!("Command failed: {}", excerpt(output))));
        }

        if self.non_empty && output.trim().is_empty() {
            return Err(fail("Output is empty".to_string()));
        }

        if let Some(expected) = &self.contains {
            if !output.contains(expected.as_str()) {
                return Err(fail(format!(
                    "Output does not contain '{}'. Got: '{}'",
                    expected,
                    excerpt(output)
                )));
            }
        }

        if !self.contains_any.is_empty()
            && !self.contains_any.iter().any(|s| output.contains(s.as_str()))
        {
            return Err(fail(format!(
                "Output contains none of {:?}. Got: '{}'",
                self.contains_any,
                excerpt(output)
            )));
        }

        if let Some(word) = self.absent.iter().find(|w| output.contains(w.as_str())) {
            return Err(fail(format!(
                "Output contains '{}': {}",
                word,
                excerpt(output)
            )));
        }

        if !self.absent_ci.is_empty() {
            let lowered = output.to_lowercase();
            if let Some(word) = self
                .absent_ci
                .iter()
                .find(|w| lowered.contains(&w.to_lowercase()))
            {
                return Err(fail(format!(
                    "Output contains '{}' (ignoring case): {}",
                    word,
                    excerpt(output)
                )));
            }
        }

        if let Some(expected) = &self.equals {
            if output.trim() != expected.trim() {
                return Err(fail(format!(
                    "Output mismatch. Expected: '{}', got: '{}'",
                    expected,
                    excerpt(output)
                )));
            }
        }

        if let Some(min) = self.min_count {
            let count: usize = output.trim().parse().map_err(|_| {
                fail(format!("Expected a count, got '{}'", excerpt(output)))
            })?;
            if count < min {
                return Err(fail(format!(
                    "Expected at least {} match(es), found {}",
                    min, count
                )));
            }
        }

        Ok(())
    }
}

fn fail(message: String) -> Error {
    Error::TestAssertion(message)
}

fn excerpt(output: &str) -> String {
    let (head, truncated) = truncate_chars(output, EXCERPT_CHARS);
    if truncated {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect(yaml: &str) -> Expectation {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_absent_words() {
        let e = expect("absent: [Exception, Error, Failure, 'not found']");
        e.check("Broadcasting: Intent { act=com.iu.diagnostics.request }\nBroadcast completed: result=0")
            .unwrap();

        let err = e.check("java.lang.SecurityException: denied").unwrap_err();
        assert!(err.assertion_message().is_some());
        assert!(err.to_string().contains("'Exception'"));

        // Sentinels fail the same check
        assert!(e.check("ERROR: Timeout running command").is_err());
    }

    #[test]
    fn test_absent_case_sensitivity() {
        let sensitive = expect("absent: [Error]");
        sensitive.check("error: lowercase is fine").unwrap();

        let insensitive = expect("absent_ci: [Error]");
        assert!(insensitive.check("error: lowercase is not").is_err());
    }

    #[test]
    fn test_contains_and_contains_any() {
        let e = expect("contains: CommandReceiver");
        e.check("  * Receiver com.iu/.CommandReceiver").unwrap();
        assert!(e.check("nothing here").is_err());

        let any = expect("contains_any: [ReceiverA, ReceiverB]");
        any.check("ReceiverB registered").unwrap();
        assert!(any.check("ReceiverC").is_err());
    }

    #[test]
    fn test_equals_trims() {
        let e = expect("equals: LANDSCAPE");
        e.check("LANDSCAPE\n").unwrap();
        assert!(e.check("PORTRAIT").is_err());
    }

    #[test]
    fn test_non_empty_and_not_error() {
        let e = expect("{ non_empty: true, not_error: true }");
        e.check("Gmail").unwrap();
        assert!(e.check("  \n").is_err());
        assert!(e.check("ERROR: Timeout running dumpsys command").is_err());
    }

    #[test]
    fn test_min_count() {
        let e = expect("min_count: 1");
        e.check("3").unwrap();
        let err = e.check("0").unwrap_err();
        assert!(err.to_string().contains("at least 1"));
        assert!(e.check("many").is_err());
    }

    #[test]
    fn test_empty_expectation_passes() {
        Expectation::default().check("").unwrap();
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(500);
        let e = expect("contains: y");
        let message = e.check(&long).unwrap_err().to_string();
        assert!(message.contains(&format!("{}...", "x".repeat(200))));
        assert!(!message.contains(&"x".repeat(201)));
    }
}
