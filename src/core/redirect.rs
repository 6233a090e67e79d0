//! Redirect Resolution
//!
//! Decides where the browser goes after sign-in. Only targets on the
//! application's own origin are honored.

use url::Url;

/// Path the user lands on when sign-in redirects to the bare base URL.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Resolve a post-login redirect target against the trusted base URL.
///
/// - the base URL itself goes to the dashboard;
/// - relative paths are joined onto the base URL;
/// - absolute URLs are kept only when they share the base URL's origin;
/// - anything else falls back to the base URL.
pub fn resolve_redirect(url: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');

    if url.trim_end_matches('/') == base {
        return format!("{}{}", base, DASHBOARD_PATH);
    }

    // Protocol-relative targets ("//evil.com") are absolute, not paths
    if url.starts_with('/') && !url.starts_with("//") {
        return format!("{}{}", base, url);
    }

    match (Url::parse(url), Url::parse(base)) {
        (Ok(target), Ok(trusted)) if target.origin() == trusted.origin() => url.to_string(),
        _ => base.to_string(),
    }
}
