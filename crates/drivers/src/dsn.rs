//! DSN helpers

use url::Url;

const REDACTED: &str = "***";

/// URL scheme of `dsn`, lowercased.
pub fn scheme(dsn: &str) -> Option<String> {
    Url::parse(dsn).ok().map(|url| url.scheme().to_ascii_lowercase())
}

/// `dsn` with any password replaced, safe to log.
///
/// A DSN that doesn't parse as a URL is hidden entirely.
pub fn redact(dsn: &str) -> String {
    let Ok(mut url) = Url::parse(dsn) else {
        return REDACTED.to_string();
    };
    if url.password().is_some() && url.set_password(Some(REDACTED)).is_err() {
        return REDACTED.to_string();
    }
    url.to_string()
}
