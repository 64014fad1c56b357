//! Partial-update helper shared by the profile handlers
//!
//! An incoming optional field overwrites the stored value only when it is
//! present and non-empty. `None` and `Some("")` both mean "not supplied".

/// Copy `incoming` onto `target` if it carries a value.
///
/// Returns true when `target` was written.
pub fn apply_field(target: &mut Option<String>, incoming: Option<&String>) -> bool {
    match incoming {
        Some(value) if is_supplied(value) => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Whether a transaction field counts as supplied
pub fn is_supplied(value: &str) -> bool {
    !value.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_value_overwrites() {
        let mut field = Some("old bio".to_string());
        let incoming = "new bio".to_string();
        assert!(apply_field(&mut field, Some(&incoming)));
        assert_eq!(field.as_deref(), Some("new bio"));
    }

    #[test]
    fn test_absent_value_is_ignored() {
        let mut field = Some("old.png".to_string());
        assert!(!apply_field(&mut field, None));
        assert_eq!(field.as_deref(), Some("old.png"));
    }

    #[test]
    fn test_empty_string_is_not_an_update() {
        let mut field = Some("old.png".to_string());
        let incoming = String::new();
        assert!(!apply_field(&mut field, Some(&incoming)));
        assert_eq!(field.as_deref(), Some("old.png"));
    }

    #[test]
    fn test_whitespace_counts_as_a_value() {
        let mut field = None;
        let incoming = " ".to_string();
        assert!(apply_field(&mut field, Some(&incoming)));
        assert_eq!(field.as_deref(), Some(" "));
    }

    #[test]
    fn test_fills_unset_field() {
        let mut field = None;
        let incoming = "Berlin".to_string();
        assert!(apply_field(&mut field, Some(&incoming)));
        assert_eq!(field.as_deref(), Some("Berlin"));
    }
}
