use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One harvested feed entry.
///
/// `timestamp` is the capture time assigned at extraction and is never
/// rewritten afterwards; merges keep the first-seen copy of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub content: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_repost: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reposted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted: Option<QuotedItem>,
}

/// An entry quoted inside another item. It cannot quote anything itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedItem {
    pub content: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}


impl Item {
    /// Builds an item from trimmed text fields.
    ///
    /// Returns `None` when both `content` and `url` are empty: such entries
    /// carry nothing worth keeping and are never admitted.
    pub fn new(
        content: impl Into<String>,
        url: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let content = trimmed(content.into());
        let url = trimmed(url.into());
        if content.is_empty() && url.is_empty() {
            return None;
        }
        Some(Self {
            content,
            url,
            image_url: None,
            timestamp,
            is_repost: false,
            reposted_by: None,
            quoted: None,
        })
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = non_empty(image_url);
        self
    }

    pub fn with_repost(mut self, reposted_by: Option<String>) -> Self {
        self.is_repost = true;
        self.reposted_by = non_empty(reposted_by);
        self
    }

    pub fn with_quoted(mut self, quoted: Option<QuotedItem>) -> Self {
        self.quoted = quoted;
        self
    }

    /// Deduplication key. Every link-less item shares the empty key, so at
    /// most one of them survives a merge.
    pub fn identity(&self) -> &str {
        &self.url
    }

    /// True when the item satisfies the admission invariant.
    pub fn is_admissible(&self) -> bool {
        !(self.url.trim().is_empty() && self.content.trim().is_empty())
    }
}

impl QuotedItem {
    /// Returns `None` if the quoted block has neither text nor link.
    pub fn new(
        content: impl Into<String>,
        url: impl Into<String>,
        image_url: Option<String>,
    ) -> Option<Self> {
        let content = trimmed(content.into());
        let url = trimmed(url.into());
        if content.is_empty() && url.is_empty() {
            return None;
        }
        Some(Self {
            content,
            url,
            image_url: non_empty(image_url),
        })
    }
}

fn trimmed(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(trimmed).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_entries_without_content_and_url() {
        assert!(Item::new("", "", at()).is_none());
        assert!(Item::new("   ", "\n", at()).is_none());
    }

    #[test]
    fn link_only_and_text_only_entries_are_admitted() {
        let link_only = Item::new("", "https://x.test/status/1", at()).unwrap();
        assert_eq!(link_only.content, "");
        assert_eq!(link_only.identity(), "https://x.test/status/1");

        let text_only = Item::new("  hello  ", "", at()).unwrap();
        assert_eq!(text_only.content, "hello");
        assert_eq!(text_only.identity(), "");
    }

    #[test]
    fn empty_optionals_collapse_to_none() {
        let item = Item::new("a", "u", at())
            .unwrap()
            .with_image_url(Some("  ".into()))
            .with_repost(Some(String::new()));
        assert_eq!(item.image_url, None);
        assert!(item.is_repost);
        assert_eq!(item.reposted_by, None);
    }

    #[test]
    fn quoted_block_needs_text_or_link() {
        assert!(QuotedItem::new("", " ", None).is_none());
        let quoted = QuotedItem::new("q", "", Some("img".into())).unwrap();
        assert_eq!(quoted.image_url.as_deref(), Some("img"));
    }

    #[test]
    fn serialized_form_omits_absent_optionals() {
        let item = Item::new("hi", "https://x.test/status/1", at()).unwrap();

        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "content": "hi",
                "url": "https://x.test/status/1",
                "timestamp": "2024-01-01T00:00:00Z",
                "is_repost": false,
            })
        );
        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
