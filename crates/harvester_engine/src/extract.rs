use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_warn};
use harvester_core::{Item, QuotedItem};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::collab::{Extractor, RenderedContent};
use crate::types::ExtractError;

/// Capture-time source for extracted items.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// CSS selectors locating feed entries and their parts. Part selectors are
/// evaluated inside each entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSelectors {
    pub entry: String,
    pub text: String,
    pub link: String,
    pub image: String,
    pub repost_indicator: String,
    pub quoted: String,
}

impl Default for FeedSelectors {
    fn default() -> Self {
        Self {
            entry: r#"article[data-testid="tweet"]"#.to_string(),
            text: r#"[data-testid="tweetText"]"#.to_string(),
            link: r#"a[href*="/status/"]"#.to_string(),
            image: r#"div[data-testid="tweetPhoto"] img"#.to_string(),
            repost_indicator: r#"[data-testid="socialContext"]"#.to_string(),
            quoted: r#"[role="link"][tabindex="0"]"#.to_string(),
        }
    }
}

struct CompiledSelectors {
    entry: Selector,
    text: Selector,
    link: Selector,
    image: Selector,
    repost_indicator: Selector,
    quoted: Selector,
}

impl CompiledSelectors {
    fn compile(selectors: &FeedSelectors) -> Result<Self, ExtractError> {
        Ok(Self {
            entry: compile(&selectors.entry)?,
            text: compile(&selectors.text)?,
            link: compile(&selectors.link)?,
            image: compile(&selectors.image)?,
            repost_indicator: compile(&selectors.repost_indicator)?,
            quoted: compile(&selectors.quoted)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

/// Extracts feed entries from the rendered page markup.
///
/// Read-only: it only ever takes snapshots of the page.
pub struct HtmlFeedExtractor<C> {
    content: C,
    selectors: CompiledSelectors,
    base_url: Option<Url>,
    clock: Clock,
}

impl<C> fmt::Debug for HtmlFeedExtractor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlFeedExtractor")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl<C: RenderedContent> HtmlFeedExtractor<C> {
    pub fn new(content: C, selectors: &FeedSelectors) -> Result<Self, ExtractError> {
        Ok(Self {
            content,
            selectors: CompiledSelectors::compile(selectors)?,
            base_url: None,
            clock: Arc::new(Utc::now),
        })
    }

    /// Base for resolving relative links and image sources. An unparsable
    /// base is logged and ignored.
    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        self.base_url = base_url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                engine_warn!("Ignoring invalid base url {:?}: {}", raw, err);
                None
            }
        });
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Parses one markup snapshot into items, in document order.
    pub fn parse(&self, html: &str) -> Vec<Item> {
        let doc = Html::parse_document(html);
        let captured_at = (self.clock)();
        let sel = &self.selectors;

        let items: Vec<Item> = doc
            .select(&sel.entry)
            .filter_map(|entry| self.parse_entry(entry, captured_at))
            .collect();
        engine_debug!("Extracted {} entries", items.len());
        items
    }

    fn parse_entry(&self, entry: ElementRef<'_>, captured_at: DateTime<Utc>) -> Option<Item> {
        let sel = &self.selectors;
        let content = first_text(entry, &sel.text).unwrap_or_default();
        let url = self.first_url(entry, &sel.link, "href").unwrap_or_default();
        let image_url = self.first_url(entry, &sel.image, "src");

        let quoted = entry.select(&sel.quoted).next().and_then(|block| {
            QuotedItem::new(
                first_text(block, &sel.text).unwrap_or_default(),
                self.first_url(block, &sel.link, "href").unwrap_or_default(),
                self.first_url(block, &sel.image, "src"),
            )
        });

        let mut item = Item::new(content, url, captured_at)?
            .with_image_url(image_url)
            .with_quoted(quoted);
        if let Some(indicator) = entry.select(&sel.repost_indicator).next() {
            item = item.with_repost(Some(element_text(indicator)));
        }
        Some(item)
    }

    fn first_url(&self, scope: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
        let raw = scope
            .select(selector)
            .find_map(|el| el.value().attr(attr))?
            .trim();
        if raw.is_empty() {
            return None;
        }
        match &self.base_url {
            Some(base) => base.join(raw).ok().map(String::from),
            None => Some(raw.to_string()),
        }
    }
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[async_trait::async_trait]
impl<C: RenderedContent> Extractor for HtmlFeedExtractor<C> {
    async fn extract(&self) -> Result<Vec<Item>, ExtractError> {
        let html = self.content.snapshot().await?;
        Ok(self.parse(&html))
    }
}
