//! URL helpers for skin API locations
//!
//! Every location handed to the fetcher must be an absolute http(s) URL with
//! a host. API bases are normalised without a trailing slash so paths can be
//! appended with a single `/`.

use url::Url;

use crate::error::{AppError, AppResult};

/// Parse `input` and require an http or https URL with a host
pub fn parse_http_url(input: &str) -> AppResult<Url> {
    let url = Url::parse(input.trim())
        .map_err(|e| AppError::InvalidUrl(format!("{}: {}", input, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                input, other
            )))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidUrl(format!("{}: missing host", input)));
    }

    Ok(url)
}

/// Remove every trailing `/`
pub fn strip_trailing_slash(input: &str) -> &str {
    input.trim_end_matches('/')
}

/// Validate an API base and return it without a trailing slash
pub fn normalize_api_base(input: &str) -> AppResult<String> {
    let trimmed = input.trim();
    parse_http_url(trimmed)?;
    Ok(strip_trailing_slash(trimmed).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_and_https_accepted() {
        assert!(parse_http_url("http://mcskin.littleservice.cn").is_ok());
        assert!(parse_http_url("https://skin.example.com/csl/").is_ok());
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(parse_http_url("file:///etc/passwd"), Err(AppError::InvalidUrl(_))));
        assert!(matches!(parse_http_url("ftp://skins.example"), Err(AppError::InvalidUrl(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(parse_http_url("not a url"), Err(AppError::InvalidUrl(_))));
        assert!(matches!(parse_http_url(""), Err(AppError::InvalidUrl(_))));
    }

    #[test]
    fn test_strip_trailing_slash() {
        assert_eq!(strip_trailing_slash("https://a.example/csl/"), "https://a.example/csl");
        assert_eq!(strip_trailing_slash("https://a.example/csl//"), "https://a.example/csl");
        assert_eq!(strip_trailing_slash("https://a.example/csl"), "https://a.example/csl");
    }

    #[test]
    fn test_normalize_api_base() {
        assert_eq!(
            normalize_api_base(" https://skin.example.com/api/ ").unwrap(),
            "https://skin.example.com/api"
        );
        assert!(normalize_api_base("skin.example.com").is_err());
    }
}
