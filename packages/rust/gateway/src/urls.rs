//! URL rewriting for addresses reported by Jenkins.
//!
//! Jenkins builds absolute URLs from its own "Jenkins URL" setting, which may
//! name a different host or base path than the one we are configured with
//! (reverse proxies, internal hostnames). Anything under `job/...` is
//! reattached to the configured base instead.

/// Rewrite `remote_url` onto `configured_base` by keeping its `job/...` suffix.
///
/// Trailing slashes are dropped. URLs without a `/job/` segment come back
/// unchanged apart from that.
pub fn normalize_url(configured_base: &str, remote_url: &str) -> String {
    let url = remote_url.trim_end_matches('/');
    match url.find("/job/") {
        Some(idx) => format!(
            "{}/{}",
            configured_base.trim_end_matches('/'),
            &url[idx + 1..]
        ),
        None => url.to_string(),
    }
}
