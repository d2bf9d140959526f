//! Shared User-Agent string for transfer requests.
//!
//! Probe requests use [`BROWSER_USER_AGENT`](crate::download::BROWSER_USER_AGENT)
//! instead, because several model hosts only send Content-Disposition to browsers.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/multiloader";

/// Default User-Agent for transfer requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("multiloader/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_user_agent_carries_version_and_url() {
        let ua = default_download_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("multiloader/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
            "UA must contain crate version"
        );
    }
}
