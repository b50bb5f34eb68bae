use regex::Regex;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing path parameter '{0}'")]
    Missing(&'static str),
    #[error("path parameter '{0}' contains characters that cannot be forwarded")]
    InvalidCharacters(&'static str),
    #[error("path parameter '{0}' too long (max 255 characters)")]
    TooLong(&'static str),
}

lazy_static::lazy_static! {
    /// Anything that would change the shape of the upstream URL once substituted.
    static ref UNSAFE_SEGMENT_RE: Regex = Regex::new(r"[/?#%\s\p{Cc}]").unwrap();
}

/// Check an identifier taken from the request path (`serverId`, `zoneId`)
/// before it is placed into an upstream URL. Returns the trimmed value.
pub fn validate_path_param<'a>(
    param: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing(param));
    }
    if value.len() > 255 {
        return Err(ValidationError::TooLong(param));
    }
    if value == "." || value == ".." || UNSAFE_SEGMENT_RE.is_match(value) {
        return Err(ValidationError::InvalidCharacters(param));
    }

    Ok(value)
}
