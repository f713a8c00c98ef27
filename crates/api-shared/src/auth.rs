/// Why an `Authorization` header could not be turned into a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthHeaderError {
    #[error("missing Authorization header")]
    Missing,
    #[error("Authorization header must be 'Bearer <token>'")]
    Malformed,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; surrounding whitespace is ignored.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthHeaderError> {
    let value = header.ok_or(AuthHeaderError::Missing)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(AuthHeaderError::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthHeaderError::Malformed);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_tokens() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("bearer   abc ")), Ok("abc"));
        assert_eq!(bearer_token(None), Err(AuthHeaderError::Missing));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthHeaderError::Malformed));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthHeaderError::Malformed));
        assert_eq!(bearer_token(Some("abc")), Err(AuthHeaderError::Malformed));
    }
}
