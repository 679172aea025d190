//! Storybook URL construction

use crate::outcome::ViewMode;

pub const DEFAULT_STORYBOOK_URL: &str = "http://localhost:6006/";

/// Appended to a live preview URL so the preview can reach the local Storybook.
pub const LIVE_URL_SUFFIX: &str = "&url=http://localhost:6006";

const INTERACTIONS_PANEL: &str = "&addonPanel=storybook/interactions/panel";

/// Resolve the viewer base URL.
///
/// A live preview URL always wins over the configured Storybook URL.
pub fn resolve_base_url(live_url: Option<&str>, storybook_url: &str) -> String {
    if let Some(live) = live_url.filter(|u| !u.is_empty()) {
        return format!("{}{}", live, LIVE_URL_SUFFIX);
    }

    storybook_url
        .strip_suffix('/')
        .unwrap_or(storybook_url)
        .to_string()
}

/// URL of the iframe renderer for a single story.
pub fn story_url(base_url: &str, story_id: &str, view_mode: ViewMode) -> String {
    format!(
        "{}/iframe.html?viewMode={}&id={}",
        base_url,
        view_mode.as_str(),
        story_id
    )
}

/// Manager URL that opens the story with the interactions panel.
pub fn deep_link(base_url: &str, story_id: &str) -> String {
    format!("{}?path=/story/{}{}", base_url, story_id, INTERACTIONS_PANEL)
}
