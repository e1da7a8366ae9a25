use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Table and column names end up in request paths and bodies; only plain
/// lower-case SQL identifiers are allowed through.
pub fn ensure_identifier(name: &str) -> Result<&str, AppError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(AppError::BadRequest(format!("invalid identifier '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case_names() {
        assert!(ensure_identifier("lesson_responses").is_ok());
        assert!(ensure_identifier("_x1").is_ok());
    }

    #[test]
    fn rejects_paths_and_quotes() {
        for bad in ["", "../users", "Lessons", "a b", "x;drop", "1abc"] {
            assert!(ensure_identifier(bad).is_err(), "{bad} should be rejected");
        }
    }
}
