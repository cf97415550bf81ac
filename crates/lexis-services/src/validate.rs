use lexis_core::{LexisError, Result};

/// Trimmed `value`, or a validation error naming `field` when it is blank.
pub(crate) fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LexisError::validation(format!(
            "Missing required field: {field}"
        )));
    }
    Ok(trimmed)
}
