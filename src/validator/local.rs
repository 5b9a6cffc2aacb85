/// Règles strictes: atext ASCII + '.' non initial/terminal, pas de ".."
pub(crate) fn is_local_strict(s: &str) -> bool {
    if s.starts_with('.') || s.ends_with('.') || s.contains("..") {
        return false;
    }
    s.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '!' | '#'
                    | '$'
                    | '%'
                    | '&'
                    | '\''
                    | '*'
                    | '+'
                    | '-'
                    | '/'
                    | '='
                    | '?'
                    | '^'
                    | '_'
                    | '`'
                    | '{'
                    | '|'
                    | '}'
                    | '~'
                    | '.'
            )
    })
}

/// Règles relaxed: autorise une quoted-string sans CR/LF ni guillemet interne,
/// sinon retombe sur `is_local_strict`.
pub(crate) fn is_local_relaxed(s: &str) -> bool {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        !inner.is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\')
    } else {
        is_local_strict(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn strict_dots() {
        assert!(!is_local_strict(".abc"));
        assert!(!is_local_strict("abc."));
        assert!(!is_local_strict("a..b"));
        assert!(is_local_strict("a.b"));
    }
    #[test]
    fn strict_rejects_space_and_angle() {
        assert!(!is_local_strict("a b"));
        assert!(!is_local_strict("a<b"));
    }
    #[test]
    fn relaxed_quoted() {
        assert!(is_local_relaxed("\"a b\""));
        assert!(!is_local_relaxed("\"a\r\nb\""));
        assert!(!is_local_relaxed("\"\""));
    }
}
