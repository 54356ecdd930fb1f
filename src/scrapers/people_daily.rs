//! People's Daily front-page scraper.
//!
//! Reads the digital edition's page-one layout, takes the first few story
//! links, and fetches each story's body text.
//!
//! # URL Pattern
//!
//! ```text
//! http://paper.people.com.cn/rmrb/pc/layout/{YYYYMM}/{DD}/node_01.html
//! ```
//!
//! Story links on the layout page are relative and resolve against it, e.g.
//! `../../../content/202505/06/content_30071234.html`.

use crate::models::Record;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const LAYOUT_BASE: &str = "http://paper.people.com.cn/rmrb/pc/layout";

/// Story-list selectors, tried in order until one yields links.
const LIST_SELECTORS: [&str; 7] = [
    ".news-list li a",
    ".right-main a",
    ".main .right a",
    ".news li a",
    ".sidebar a",
    ".news a",
    ".swiper-container a",
];

/// Body selectors, tried in order until one yields enough text.
const CONTENT_SELECTORS: [&str; 7] = [
    "#ozoom",
    ".text_c, .content, article",
    "#artibody",
    ".article",
    ".cont_box",
    ".cnt_bd",
    ".main-text",
];

/// Shorter bodies are treated as navigation chrome, not an article.
const MIN_CONTENT_CHARS: usize = 100;

static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
/// Runs of ASCII, ideographic (U+3000) or no-break spaces inside a line.
static INLINE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{3000}\u{a0}]+").expect("static regex"));

/// A story link found on the layout page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedArticle {
    pub title: String,
    pub url: String,
}

pub fn layout_url(date: NaiveDate) -> String {
    format!(
        "{LAYOUT_BASE}/{}/{}/node_01.html",
        date.format("%Y%m"),
        date.format("%d")
    )
}

/// Index the page-one layout for `date` and return up to `count` stories.
#[instrument(level = "info", skip(client))]
pub async fn index_articles(
    client: &Client,
    date: NaiveDate,
    count: usize,
) -> Result<Vec<IndexedArticle>, Box<dyn Error>> {
    let page_url = layout_url(date);
    let base = Url::parse(&page_url)?;

    let html = client.get(&page_url).send().await?.error_for_status()?.text().await?;
    let links = parse_index(&html, &base, count);

    info!(
        count = links.len(),
        source = %page_url,
        "Indexed People's Daily article URLs"
    );
    debug!(urls = ?links, "People's Daily URLs");

    Ok(links)
}

/// Pull story links out of a layout page.
///
/// The first list selector with any link whose text is longer than three
/// characters wins. If none matches, every link with more than five
/// characters of text is considered, skipping script and layout
/// navigation links.
pub fn parse_index(html: &str, base: &Url, count: usize) -> Vec<IndexedArticle> {
    let document = Html::parse_document(html);

    for raw in LIST_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let links: Vec<IndexedArticle> = document
            .select(&selector)
            .filter_map(|a| link_of(a, base, 3))
            .take(count)
            .collect();
        if !links.is_empty() {
            debug!(selector = raw, found = links.len(), "Matched story list");
            return links;
        }
    }

    warn!("No story list matched; falling back to all page links");
    document
        .select(&ANY_LINK)
        .filter_map(|a| link_of(a, base, 5))
        .filter(|link| {
            !link.url.starts_with("javascript:")
                && !link.url.contains("layout")
                && !link.url.contains("index")
        })
        .take(count)
        .collect()
}

fn link_of(a: ElementRef<'_>, base: &Url, min_chars: usize) -> Option<IndexedArticle> {
    let href = a.value().attr("href")?;
    let title = a.text().collect::<String>().trim().to_string();
    if title.chars().count() <= min_chars {
        return None;
    }
    let url = base.join(href).ok()?;
    Some(IndexedArticle {
        title,
        url: url.to_string(),
    })
}

/// Fetch every indexed story, one at a time.
///
/// A story whose page cannot be fetched is still returned, with the error
/// text in place of its body, so the day file records what was attempted.
#[instrument(level = "info", skip_all, fields(count = links.len()))]
pub async fn fetch_articles(client: &Client, links: Vec<IndexedArticle>) -> Vec<Record> {
    let records: Vec<Record> = stream::iter(links)
        .then(|link| async move {
            match fetch_article(client, &link.url).await {
                Ok(content) => {
                    debug!(url = %link.url, chars = content.chars().count(), "Fetched People's Daily article");
                    Record::scraped(link.title, link.url, content)
                }
                Err(e) => {
                    error!(error = %e, url = %link.url, "People's Daily fetch failed");
                    let content = format!("获取内容时出错: {e}");
                    Record::scraped(link.title, link.url, content)
                }
            }
        })
        .collect()
        .await;

    info!(count = records.len(), "Fetched People's Daily article contents");
    records
}

#[instrument(level = "info", skip(client))]
async fn fetch_article(client: &Client, url: &str) -> Result<String, Box<dyn Error>> {
    let body = client.get(url).send().await?.error_for_status()?.text().await?;
    Ok(parse_article(&body))
}

/// Extract an article body.
///
/// Tries the known content containers, then long paragraphs, then the whole
/// page text.
pub fn parse_article(html: &str) -> String {
    let document = Html::parse_document(html);

    for raw in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            if text.chars().count() > MIN_CONTENT_CHARS {
                return text;
            }
        }
    }

    let paragraphs = document
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|p| p.chars().count() > 30)
        .collect::<Vec<_>>()
        .join("\n\n");
    if paragraphs.chars().count() > MIN_CONTENT_CHARS {
        return paragraphs;
    }

    let full = document
        .select(&BODY)
        .next()
        .map(element_text)
        .unwrap_or_default();
    if full.is_empty() {
        "无法获取内容".to_string()
    } else {
        full
    }
}

/// Visible text of an element, one trimmed line per text node.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(|t| INLINE_SPACE.replace_all(t, " ").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://paper.people.com.cn/rmrb/pc/layout/202505/06/node_01.html").unwrap()
    }

    #[test]
    fn test_layout_url() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        assert_eq!(
            layout_url(date),
            "http://paper.people.com.cn/rmrb/pc/layout/202505/06/node_01.html"
        );
    }

    #[test]
    fn test_parse_index_uses_story_list() {
        let html = r#"
            <html><body>
              <ul class="news-list">
                <li><a href="../../../content/202505/06/content_1.html">习近平会见外国元首</a></li>
                <li><a href="../../../content/202505/06/content_2.html">图片</a></li>
                <li><a href="../../../content/202505/06/content_3.html">全国春耕进度过半</a></li>
                <li><a href="../../../content/202505/06/content_4.html">第三条新闻标题</a></li>
              </ul>
            </body></html>
        "#;

        let links = parse_index(html, &base(), 2);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "习近平会见外国元首");
        assert_eq!(
            links[0].url,
            "http://paper.people.com.cn/rmrb/pc/content/202505/06/content_1.html"
        );
        assert_eq!(links[1].title, "全国春耕进度过半");
    }

    #[test]
    fn test_parse_index_falls_back_to_page_links() {
        let html = r#"
            <html><body>
              <a href="node_02.html">第02版：要闻</a>
              <a href="javascript:void(0)">打开新闻的链接</a>
              <a href="/rmrb/pc/layout/202505/06/node_03.html">第03版：要闻版面</a>
              <a href="../../../content/202505/06/content_9.html">一篇足够长的新闻标题</a>
            </body></html>
        "#;

        let links = parse_index(html, &base(), 3);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "一篇足够长的新闻标题");
    }

    #[test]
    fn test_parse_article_prefers_ozoom() {
        let body = "本报北京5月5日电 ".repeat(20);
        let html = format!(
            r#"<html><body><div class="nav">首页 上一版</div>
               <div id="ozoom"><p>　　{body}</p><p>　　第二段。</p></div></body></html>"#
        );

        let content = parse_article(&html);

        assert!(content.starts_with("本报北京5月5日电"));
        assert!(content.ends_with("第二段。"));
        assert!(!content.contains("首页"));
        assert!(!content.contains('\u{3000}'));
    }

    #[test]
    fn test_parse_article_falls_back_to_paragraphs() {
        let para = "这是一个足够长的段落，用来确认段落回退逻辑能够正确地提取正文内容。".repeat(2);
        let html = format!(
            "<html><body><p>短</p><p>{para}</p><p>{para}</p></body></html>"
        );

        let content = parse_article(&html);

        assert_eq!(content, format!("{para}\n\n{para}"));
    }

    #[test]
    fn test_parse_article_empty_page() {
        assert_eq!(parse_article("<html><body></body></html>"), "无法获取内容");
    }
}
