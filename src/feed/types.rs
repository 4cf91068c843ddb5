use serde::Deserialize;

/// One ranked item as returned by the item endpoint. Never persisted wholesale.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedItem {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub score: i64,
    /// Comment count.
    #[serde(default)]
    pub descendants: i64,
    // Ask/Show posts have no url
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl FeedItem {
    pub fn is_story(&self) -> bool {
        self.kind == "story"
    }
}
