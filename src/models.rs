//! Data models for the day's article records and their annotations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Record`]: one article in a day collection, raw or annotated
//! - [`Category`], [`SourceSite`], [`DuplicateFlag`]: the closed vocabularies
//!   the model picks from
//! - [`Annotation`]: the structured result attached to a record by the summarizer
//!
//! Day files on disk always hold a bare JSON array of [`Record`]. Older files
//! that wrapped the list in an object are normalized by [`parse_day_file`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the summary written when the model could not annotate a record.
pub const SENTINEL_PREFIX: &str = "generation failed: ";

/// One article in a day collection.
///
/// `id` is unique and contiguous within a day. Freshly scraped records carry
/// a provisional id (usually 0) until the store renumbers them on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    /// The article URL.
    #[serde(default, alias = "url")]
    pub source: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "web")]
    pub source_site: Option<SourceSite>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "is_duplicate"
    )]
    pub is_duplicate: Option<DuplicateFlag>,
}

impl Record {
    /// A freshly scraped record with a provisional id.
    pub fn scraped(
        title: impl Into<String>,
        source: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            source: source.into(),
            content: content.into(),
            summary: None,
            category: None,
            source_site: None,
            is_duplicate: None,
        }
    }

    /// Copy the annotation fields onto this record.
    pub fn annotate(&mut self, annotation: Annotation) {
        self.summary = Some(annotation.summary);
        self.category = Some(annotation.category);
        self.source_site = Some(annotation.source_site);
        self.is_duplicate = Some(annotation.is_duplicate);
    }

    pub fn is_annotated(&self) -> bool {
        self.summary.is_some()
            && self.category.is_some()
            && self.source_site.is_some()
            && self.is_duplicate.is_some()
    }

    /// True when the summary is a sentinel and a human should look at it.
    pub fn needs_review(&self) -> bool {
        self.summary
            .as_deref()
            .is_some_and(|s| s.starts_with(SENTINEL_PREFIX))
    }

    /// True when the model judged this article a repeat of an earlier one.
    pub fn flagged_duplicate(&self) -> bool {
        self.is_duplicate == Some(DuplicateFlag::Yes)
    }
}

/// Section a record is filed under in the brief.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    #[default]
    #[serde(rename = "中国新闻", alias = "ChinaNews")]
    ChinaNews,
    #[serde(rename = "国际新闻", alias = "InternationalNews")]
    InternationalNews,
    #[serde(rename = "汽车相关", alias = "AutoRelated")]
    AutoRelated,
}

impl Category {
    /// All categories, in the order the brief lists its sections.
    pub const ALL: [Category; 3] = [
        Category::ChinaNews,
        Category::InternationalNews,
        Category::AutoRelated,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::ChinaNews => "中国新闻",
            Category::InternationalNews => "国际新闻",
            Category::AutoRelated => "汽车相关",
        }
    }

    /// Parse a label the model returned. Only the exact vocabulary is accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == label.trim())
    }

    pub fn section_title(self) -> &'static str {
        match self {
            Category::ChinaNews => "一: 综合热点新闻(国内)",
            Category::InternationalNews => "二: 综合热点新闻(国际)",
            Category::AutoRelated => "三: 汽车类热点新闻",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Publication an article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSite {
    #[serde(rename = "澎湃新闻", alias = "ThePaper")]
    ThePaper,
    #[serde(rename = "人民日报", alias = "PeopleDaily")]
    PeopleDaily,
    #[serde(rename = "第一财经", alias = "Yicai")]
    Yicai,
    #[serde(rename = "盖世汽车", alias = "Gasgoo")]
    Gasgoo,
    #[serde(rename = "新华网", alias = "Xinhua")]
    Xinhua,
    /// Placeholder used only by sentinel annotations.
    #[serde(rename = "check")]
    Unverified,
}

impl SourceSite {
    /// The sites the model may choose from.
    pub const VOCABULARY: [SourceSite; 5] = [
        SourceSite::ThePaper,
        SourceSite::PeopleDaily,
        SourceSite::Yicai,
        SourceSite::Gasgoo,
        SourceSite::Xinhua,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SourceSite::ThePaper => "澎湃新闻",
            SourceSite::PeopleDaily => "人民日报",
            SourceSite::Yicai => "第一财经",
            SourceSite::Gasgoo => "盖世汽车",
            SourceSite::Xinhua => "新华网",
            SourceSite::Unverified => "check",
        }
    }

    /// Parse a label the model returned. `check` is not part of the vocabulary.
    pub fn from_label(label: &str) -> Option<Self> {
        SourceSite::VOCABULARY
            .into_iter()
            .find(|s| s.label() == label.trim())
    }

    /// Guess the publication from an article URL's host.
    pub fn from_url(source: &str) -> Option<Self> {
        let parsed = url::Url::parse(source).ok()?;
        let host = parsed.host_str()?;
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if matches("people.com.cn") {
            Some(SourceSite::PeopleDaily)
        } else if matches("yicai.com") {
            Some(SourceSite::Yicai)
        } else if matches("thepaper.cn") {
            Some(SourceSite::ThePaper)
        } else if matches("gasgoo.com") {
            Some(SourceSite::Gasgoo)
        } else if matches("xinhuanet.com") || matches("news.cn") {
            Some(SourceSite::Xinhua)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The model's judgement of whether a record repeats earlier news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateFlag {
    #[serde(rename = "yes", alias = "是")]
    Yes,
    #[serde(rename = "no", alias = "否")]
    No,
}

impl DuplicateFlag {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "是" | "yes" => Some(DuplicateFlag::Yes),
            "否" | "no" => Some(DuplicateFlag::No),
            _ => None,
        }
    }
}

/// The structured result the summarizer attaches to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub summary: String,
    pub category: Category,
    pub source_site: SourceSite,
    pub is_duplicate: DuplicateFlag,
}

impl Annotation {
    /// Placeholder used when the remote call for `record` failed.
    pub fn sentinel(record: &Record, reason: &str) -> Self {
        Self {
            summary: format!("{SENTINEL_PREFIX}{reason}"),
            category: Category::default(),
            source_site: SourceSite::from_url(&record.source).unwrap_or(SourceSite::Unverified),
            is_duplicate: DuplicateFlag::No,
        }
    }
}

/// Raw JSON object the model is instructed to return.
#[derive(Debug, Deserialize)]
pub struct ModelVerdict {
    #[serde(rename = "总结")]
    pub summary: String,
    #[serde(rename = "标签")]
    pub category: String,
    #[serde(rename = "网站")]
    pub site: String,
    #[serde(rename = "是否在历史新闻中出现过")]
    pub seen_before: String,
}

/// Shapes a day file has been written in.
#[derive(Deserialize)]
#[serde(untagged)]
enum DayFileShape {
    Canonical(Vec<Record>),
    Wrapped(WrappedRecords),
}

#[derive(Deserialize)]
struct WrappedRecords {
    #[serde(alias = "news", alias = "articles", alias = "selected_news")]
    records: Vec<Record>,
}

/// Result of parsing a day file.
#[derive(Debug)]
pub struct ParsedDayFile {
    pub records: Vec<Record>,
    /// The file used a wrapped legacy shape rather than a bare array.
    pub legacy_shape: bool,
}

/// Parse a day file, accepting the canonical bare array or a legacy object
/// wrapping the list.
pub fn parse_day_file(bytes: &[u8]) -> Result<ParsedDayFile, serde_json::Error> {
    match serde_json::from_slice::<DayFileShape>(bytes)? {
        DayFileShape::Canonical(records) => Ok(ParsedDayFile {
            records,
            legacy_shape: false,
        }),
        DayFileShape::Wrapped(wrapped) => Ok(ParsedDayFile {
            records: wrapped.records,
            legacy_shape: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_uses_camel_case() {
        let mut record = Record::scraped("标题", "https://www.yicai.com/news/1.html", "正文");
        record.id = 7;
        record.annotate(Annotation {
            summary: "摘要".into(),
            category: Category::AutoRelated,
            source_site: SourceSite::Yicai,
            is_duplicate: DuplicateFlag::No,
        });

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""sourceSite":"第一财经""#));
        assert!(json.contains(r#""isDuplicate":"no""#));
        assert!(json.contains(r#""category":"汽车相关""#));
    }

    #[test]
    fn test_raw_record_omits_annotation_fields() {
        let record = Record::scraped("A", "https://example.com/a", "body");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("summary"));
        assert!(!json.contains("sourceSite"));
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let json = r#"{
            "id": 3,
            "title": "央行降息公告",
            "source": "http://paper.people.com.cn/rmrb/pc/content/1.html",
            "content": "...",
            "summary": "摘要",
            "category": "中国新闻",
            "web": "人民日报",
            "is_duplicate": "否"
        }"#;

        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_site, Some(SourceSite::PeopleDaily));
        assert_eq!(record.is_duplicate, Some(DuplicateFlag::No));
        assert!(record.is_annotated());
    }

    #[test]
    fn test_parse_day_file_bare_array() {
        let parsed = parse_day_file(br#"[{"id":1,"title":"A","source":"s","content":"c"}]"#).unwrap();
        assert!(!parsed.legacy_shape);
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_parse_day_file_wrapped_shape() {
        let parsed = parse_day_file(
            br#"{"selected_news":[{"id":1,"title":"A","url":"https://a"},{"id":2,"title":"B","url":"https://b"}]}"#,
        )
        .unwrap();
        assert!(parsed.legacy_shape);
        assert_eq!(parsed.records[1].source, "https://b");
    }

    #[test]
    fn test_parse_day_file_rejects_other_shapes() {
        assert!(parse_day_file(br#"{"items": 3}"#).is_err());
        assert!(parse_day_file(b"not json").is_err());
    }

    #[test]
    fn test_category_vocabulary_is_closed() {
        assert_eq!(Category::from_label("国际新闻"), Some(Category::InternationalNews));
        assert_eq!(Category::from_label(" 汽车相关 "), Some(Category::AutoRelated));
        assert_eq!(Category::from_label("体育新闻"), None);
        assert_eq!(Category::from_label("ChinaNews"), None);
    }

    #[test]
    fn test_source_site_vocabulary_excludes_placeholder() {
        assert_eq!(SourceSite::from_label("新华网"), Some(SourceSite::Xinhua));
        assert_eq!(SourceSite::from_label("check"), None);
    }

    #[test]
    fn test_source_site_from_url() {
        assert_eq!(
            SourceSite::from_url("http://paper.people.com.cn/rmrb/pc/content/202505/06/c1.html"),
            Some(SourceSite::PeopleDaily)
        );
        assert_eq!(
            SourceSite::from_url("https://www.news.cn/politics/2025-05/06/c_1.htm"),
            Some(SourceSite::Xinhua)
        );
        assert_eq!(
            SourceSite::from_url("https://auto.gasgoo.com/news/1.shtml"),
            Some(SourceSite::Gasgoo)
        );
        assert_eq!(SourceSite::from_url("https://fakenews.cn/x"), None);
        assert_eq!(SourceSite::from_url("not a url"), None);
    }

    #[test]
    fn test_duplicate_flag_labels() {
        assert_eq!(DuplicateFlag::from_label("是"), Some(DuplicateFlag::Yes));
        assert_eq!(DuplicateFlag::from_label("否"), Some(DuplicateFlag::No));
        assert_eq!(DuplicateFlag::from_label("maybe"), None);
    }

    #[test]
    fn test_sentinel_annotation() {
        let record = Record::scraped("A", "https://www.thepaper.cn/newsDetail_1", "body");
        let annotation = Annotation::sentinel(&record, "timeout");
        assert_eq!(annotation.summary, "generation failed: timeout");
        assert_eq!(annotation.category, Category::ChinaNews);
        assert_eq!(annotation.source_site, SourceSite::ThePaper);
        assert_eq!(annotation.is_duplicate, DuplicateFlag::No);

        let unknown = Record::scraped("B", "https://example.org/b", "body");
        assert_eq!(
            Annotation::sentinel(&unknown, "x").source_site,
            SourceSite::Unverified
        );
    }

    #[test]
    fn test_needs_review() {
        let mut record = Record::scraped("A", "https://example.org/a", "body");
        assert!(!record.needs_review());
        record.annotate(Annotation::sentinel(&record.clone(), "boom"));
        assert!(record.needs_review());
        assert!(record.is_annotated());
    }

    #[test]
    fn test_model_verdict_parses_chinese_keys() {
        let json = r#"{"总结":"s","标签":"中国新闻","网站":"新华网","是否在历史新闻中出现过":"否"}"#;
        let verdict: ModelVerdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.category, "中国新闻");
        assert_eq!(verdict.seen_before, "否");
    }
}
