use crate::config::FilterConfig;
use crate::feed::types::FeedItem;

/// Items that are never posted or re-rendered: non-stories, low score,
/// few comments, or no link.
pub fn should_ignore(item: &FeedItem, filter: &FilterConfig) -> bool {
    !item.is_story()
        || item.score < filter.score_threshold
        || item.descendants < filter.comments_threshold
        || item.url.is_empty()
}
