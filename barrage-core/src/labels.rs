use std::collections::BTreeMap;

/// Label set attached to every sink entry.
///
/// Ordered so that equal label sets always serialize (and group) the same way.
pub type Labels = BTreeMap<String, String>;

/// Checks that every label name is of the form `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Returns the first offending name.
pub fn validate_labels(labels: &Labels) -> Result<(), String> {
    match labels.keys().find(|name| !is_valid_label_name(name)) {
        Some(name) => Err(name.clone()),
        None => Ok(()),
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Labels {
        names
            .iter()
            .map(|n| (n.to_string(), "value".to_string()))
            .collect()
    }

    #[test]
    fn accepts_prometheus_style_names() {
        assert!(validate_labels(&labels(&["go_test_name", "_hidden", "branch2"])).is_ok());
        assert!(validate_labels(&Labels::new()).is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            validate_labels(&labels(&["ok", "2fast"])),
            Err("2fast".to_string())
        );
        assert_eq!(
            validate_labels(&labels(&["has-dash"])),
            Err("has-dash".to_string())
        );
        assert_eq!(validate_labels(&labels(&[""])), Err(String::new()));
    }
}
