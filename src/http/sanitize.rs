//! Blank-field stripping for PATCH payloads.
//!
//! `{"text": "", "email": "a@b.c"}` patches only `email`.

/// Drops empty and whitespace-only strings.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub trait RemoveBlanks {
    fn remove_blanks(self) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks_become_absent() {
        assert_eq!(non_blank(Some("".into())), None);
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" hi ".into())), Some(" hi ".into()));
    }
}
