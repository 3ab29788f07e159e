//! Label value syntax.

use std::sync::LazyLock;

use regex::Regex;

/// Longest permitted label value.
pub const LABEL_VALUE_MAX_LENGTH: usize = 63;

const LABEL_VALUE_FMT: &str = "(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?";

static LABEL_VALUE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&format!("^{LABEL_VALUE_FMT}$")));

/// Check a label value, returning one message per violated rule.
/// An empty result means the value is valid.
pub fn validate_label_value(value: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if value.len() > LABEL_VALUE_MAX_LENGTH {
        errors.push(format!(
            "must be no more than {LABEL_VALUE_MAX_LENGTH} characters"
        ));
    }

    let well_formed = LABEL_VALUE_RE
        .as_ref()
        .is_ok_and(|re| re.is_match(value));
    if !well_formed {
        errors.push(format!(
            "a valid label must be an empty string or consist of alphanumeric characters, \
             '-', '_' or '.', and must start and end with an alphanumeric character \
             (e.g. 'MyValue',  or 'my_value',  or '12345', regex used for validation is '{LABEL_VALUE_FMT}')"
        ));
    }

    errors
}

pub fn is_valid_label_value(value: &str) -> bool {
    validate_label_value(value).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_values() {
        for good in ["", "nvidia-t4", "A100", "my_value", "1.2.3", "x"] {
            assert!(is_valid_label_value(good), "{good:?} should be valid");
        }
    }

    #[test]
    fn test_slash_is_invalid() {
        let errors = validate_label_value("nvidia.com/gpu");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_edges_must_be_alphanumeric() {
        assert!(!is_valid_label_value("-gpu"));
        assert!(!is_valid_label_value("gpu."));
    }

    #[test]
    fn test_too_long_reports_length() {
        let value = "a".repeat(LABEL_VALUE_MAX_LENGTH + 1);
        let errors = validate_label_value(&value);
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().any(|e| e.contains("63")));
    }
}
