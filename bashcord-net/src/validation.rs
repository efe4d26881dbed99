// bashcord-net/src/validation.rs
use bashcord_common::error::{BashcordError, Result};
use url::Url;

/// Validates a URL, ensuring it uses the HTTPS scheme.
pub fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str)
        .map_err(|e| BashcordError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(BashcordError::ValidationError(format!(
            "Invalid URL scheme for '{}': Must be https, but got '{}'",
            url_str,
            url.scheme()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_https_is_accepted() {
        validate_url("https://github.com/GooseMod/OpenAsar/releases/download/nightly/app.asar")
            .unwrap();
        assert!(validate_url("http://github.com/x").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
