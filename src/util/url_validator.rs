use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a configured endpoint.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host.
    #[error("Insecure URL: HTTPS required (except localhost for testing)")]
    Insecure,
}

/// Validates an endpoint URL from the configuration file.
///
/// Endpoints carry credentials (webhook URLs embed a token, the mail relay
/// gets a bearer token), so HTTPS is required. Plain HTTP is accepted only
/// for loopback hosts, which is what local mock servers bind to.
///
/// # Examples
///
/// ```
/// use showwatch::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://hooks.slack.com/services/T/B/X").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080/hook").is_ok());
/// assert!(validate_endpoint("http://example.com/hook").is_err());
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback_host(&url) => {
            tracing::warn!(url = %url, "Using non-HTTPS endpoint (localhost only)");
            Ok(url)
        }
        "http" => Err(UrlValidationError::Insecure),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }
    // Strip brackets from IPv6 addresses for parsing
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_endpoint("https://tv.example.com/api/search").unwrap();
        assert_eq!(url.host_str(), Some("tv.example.com"));
    }

    #[test]
    fn test_http_loopback_accepted() {
        assert!(validate_endpoint("http://localhost:3000/search").is_ok());
        assert!(validate_endpoint("http://127.0.0.1:3000/search").is_ok());
        assert!(validate_endpoint("http://[::1]:3000/search").is_ok());
    }

    #[test]
    fn test_http_remote_rejected() {
        assert!(matches!(
            validate_endpoint("http://hooks.example.com/x"),
            Err(UrlValidationError::Insecure)
        ));
        // Private but not loopback is still remote
        assert!(matches!(
            validate_endpoint("http://192.168.1.10/x"),
            Err(UrlValidationError::Insecure)
        ));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_endpoint("ftp://example.com/x"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(matches!(
            validate_endpoint("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
