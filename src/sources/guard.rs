use regex::Regex;
use std::sync::LazyLock;

use crate::error::{PlayerError, PlayerResult};

/// Invite links are never handed to the resolver.
static DENYLIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)discord\.gg/",
        r"(?i)discord(app)?\.com/invite",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Fails with [`PlayerError::InvalidInput`] when the query matches a denylisted pattern.
pub fn check_query(query: &str) -> PlayerResult<()> {
    if query.trim().is_empty() {
        return Err(PlayerError::InvalidInput("empty query".to_string()));
    }

    if DENYLIST.iter().any(|re| re.is_match(query)) {
        return Err(PlayerError::InvalidInput(
            "invite links cannot be played".to_string(),
        ));
    }

    Ok(())
}

/// Whether the query should be treated as a direct URL rather than a search.
pub fn is_url(query: &str) -> bool {
    let query = query.trim();
    (query.starts_with("http://") || query.starts_with("https://"))
        && url::Url::parse(query).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_links_rejected() {
        for query in [
            "https://discord.gg/abcdef",
            "discord.gg/abcdef",
            "https://discord.com/invite/abcdef",
            "https://DISCORDAPP.com/invite/xyz",
            "listen here discord.gg/xyz",
        ] {
            assert!(
                matches!(check_query(query), Err(PlayerError::InvalidInput(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn test_regular_queries_allowed() {
        assert!(check_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(check_query("lofi hip hop").is_ok());
        assert!(check_query("https://discord.com/channels/1/2").is_ok());
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(check_query("   ").is_err());
    }

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_url("  http://example.com/a.mp3 "));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("https://"));
    }
}
