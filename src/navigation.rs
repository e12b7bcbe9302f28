//! Hand-off to the card gateway's hosted payment page.

use reqwest::Url;
use tracing::info;

const REDIRECT_URL_MAX_LEN: usize = 2048;

/// Opens a URL for the customer. The counter uses the system browser; tests
/// record the target instead.
pub trait Navigator: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), String>;
}

pub struct SystemBrowser;

impl Navigator for SystemBrowser {
    fn open(&self, url: &Url) -> Result<(), String> {
        webbrowser::open(url.as_str()).map_err(|e| format!("Failed to open payment page: {e}"))?;
        info!(
            host = url.host_str().unwrap_or("unknown"),
            "Opened payment gateway page"
        );
        Ok(())
    }
}

/// Check a gateway redirect URL before sending the customer to it:
/// http(s) only, no embedded credentials, bounded length.
///
/// Relative URLs (`/pay/123`) are resolved against `base`, the payment
/// proxy's origin, the way a browser resolves them against the page.
pub fn validate_redirect_url(url_raw: &str, base: Option<&Url>) -> Result<Url, String> {
    let trimmed = url_raw.trim();
    if trimmed.is_empty() {
        return Err("Redirect URL cannot be empty".into());
    }
    if trimmed.len() > REDIRECT_URL_MAX_LEN {
        return Err("Redirect URL is too long".into());
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(e) => match base {
            // An input with a scheme fails the join the same way it failed here.
            Some(base) => base
                .join(trimmed)
                .map_err(|e| format!("Invalid redirect URL: {e}"))?,
            None => return Err(format!("Invalid redirect URL: {e}")),
        },
    };
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "https" && scheme != "http" {
        return Err("Only http/https redirect URLs are allowed".into());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("Credentialed URLs are not allowed".into());
    }
    if parsed.host_str().is_none() {
        return Err("Redirect URL is missing a host".into());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    #[test]
    fn test_accepts_gateway_pages() {
        let url = validate_redirect_url(" https://gateway.example.com/pay?id=1 ", None).unwrap();
        assert_eq!(url.host_str(), Some("gateway.example.com"));
        assert!(validate_redirect_url("http://localhost:3000/mock", None).is_ok());
        // Absolute URLs ignore the base.
        let url =
            validate_redirect_url("https://gateway.example.com/pay", Some(&proxy())).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.com/pay");
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let url = validate_redirect_url("/pay/123", Some(&proxy())).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/pay/123");
        let url = validate_redirect_url("mock-checkout?id=7", Some(&proxy())).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/mock-checkout?id=7");
        assert!(validate_redirect_url("/pay/123", None).is_err());
    }

    #[test]
    fn test_rejects_unsafe_urls() {
        let base = proxy();
        assert!(validate_redirect_url("", Some(&base)).is_err());
        assert!(validate_redirect_url("javascript:alert(1)", Some(&base)).is_err());
        assert!(validate_redirect_url("ftp://gateway.example.com", Some(&base)).is_err());
        assert!(validate_redirect_url("https://user:pw@gateway.example.com", Some(&base)).is_err());
        assert!(validate_redirect_url("not a url", None).is_err());
        let long = format!("https://gateway.example.com/{}", "a".repeat(REDIRECT_URL_MAX_LEN));
        assert!(validate_redirect_url(&long, Some(&base)).is_err());
    }
}
