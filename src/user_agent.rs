//! Shared User-Agent string for index and artifact requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/wheelfetch";

/// Default User-Agent for every HTTP request the tool makes.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("wheelfetch/{version} (+{PROJECT_UA_URL})")
}
