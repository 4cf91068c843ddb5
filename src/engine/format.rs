use crate::config::Config;
use crate::feed::hacker_news::permalink;
use crate::feed::types::FeedItem;
use crate::telegram::types::*;

const HOT_MARKER: &str = " 🔥";

/// Builds channel requests for one configured chat.
#[derive(Debug, Clone)]
pub struct MessageFormat {
    pub chat_id: String,
    pub parse_mode: String,
    pub site_base: String,
    pub hot_threshold: i64,
}

impl MessageFormat {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chat_id: config.telegram.chat_id.clone(),
            parse_mode: config.telegram.parse_mode.clone(),
            site_base: config.feed.site_base.clone(),
            hot_threshold: config.filter.hot_threshold,
        }
    }

    pub fn reply_markup(&self, item: &FeedItem) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton {
                    text: counter_label("Score", item.score, self.hot_threshold),
                    url: item.url.clone(),
                },
                InlineKeyboardButton {
                    text: counter_label("Comments", item.descendants, self.hot_threshold),
                    url: permalink(&self.site_base, item.id),
                },
            ]],
        }
    }

    pub fn send_request(&self, item: &FeedItem) -> SendMessageRequest {
        SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: render_text(item),
            parse_mode: self.parse_mode.clone(),
            reply_markup: self.reply_markup(item),
        }
    }

    pub fn edit_request(&self, item: &FeedItem, message_id: i64) -> EditMessageTextRequest {
        EditMessageTextRequest {
            chat_id: self.chat_id.clone(),
            message_id,
            text: render_text(item),
            parse_mode: self.parse_mode.clone(),
            reply_markup: self.reply_markup(item),
        }
    }

    pub fn delete_request(&self, message_id: i64) -> DeleteMessageRequest {
        DeleteMessageRequest { chat_id: self.chat_id.clone(), message_id }
    }
}

/// `<b>title</b>  url`, title escaped for HTML parse mode.
pub fn render_text(item: &FeedItem) -> String {
    format!("<b>{}</b>  {}", escape_html(&item.title), escape_html(&item.url))
}

/// "Score: 150 🔥" above the threshold, plain "Score: 50" otherwise.
pub fn counter_label(name: &str, value: i64, hot_threshold: i64) -> String {
    let marker = if value > hot_threshold { HOT_MARKER } else { "" };
    format!("{}: {}{}", name, value, marker)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
