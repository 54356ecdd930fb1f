//! Per-record summarization and classification.
//!
//! Each record is sent to the model with its title, URL and (cleaned,
//! truncated) text, plus the titles already seen today and on earlier days so
//! the model can flag near-duplicates that exact title matching missed.
//!
//! A failed record never stops the batch. [`Summarizer::summarize`] returns a
//! `Result`; [`Summarizer::annotate_batch`] turns every `Err` into a sentinel
//! annotation, counts it, and moves on.

use crate::api::{AskAsync, ChatPrompt};
use crate::dedup::HistoricalTitles;
use crate::error::SummarizeError;
use crate::models::{Annotation, Category, DuplicateFlag, ModelVerdict, Record, SourceSite};
use crate::utils::{clean_content, looks_truncated, truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

const SYSTEM_PROMPT: &str =
    "你是一名专业的新闻分析助手，负责新闻内容的总结与分类。只输出 JSON。";

/// Titles the model should compare the current record against.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    /// `标题：…` lines for records earlier in today's batch.
    pub today_so_far: &'a str,
    pub history: &'a HistoricalTitles,
}

/// Outcome of annotating a whole collection.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Every input record, in input order, with annotation fields populated.
    pub records: Vec<Record>,
    /// `(id, reason)` for each record that fell back to a sentinel.
    pub failures: Vec<(u64, String)>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.records.len()
    }

    pub fn needs_review(&self) -> usize {
        self.failures.len()
    }

    /// Records the model judged to repeat earlier news.
    pub fn flagged_duplicates(&self) -> usize {
        self.records.iter().filter(|r| r.flagged_duplicate()).count()
    }
}

/// Summarizer Adapter over any [`AskAsync`] backend.
#[derive(Debug)]
pub struct Summarizer<A> {
    client: A,
    max_content_chars: usize,
}

impl<A> Summarizer<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(client: A, max_content_chars: usize) -> Self {
        Self {
            client,
            max_content_chars,
        }
    }

    pub fn build_prompt(&self, record: &Record, ctx: SummaryContext<'_>) -> ChatPrompt {
        let content = truncate_chars(&clean_content(&record.content), self.max_content_chars);
        let categories = Category::ALL.iter().map(|c| format!("\"{c}\"")).join("，");
        let sites = SourceSite::VOCABULARY
            .iter()
            .map(|s| format!("\"{s}\""))
            .join("，");

        let user = format!(
            r#"请对下面这条新闻做总结和分类。

标题：{title}
来源：{source}
内容：{content}

要求：
1. 总结：忠实于原文提炼要点，政策表述、数字、日期时间等关键细节必须保留。
2. 标签：只能从 {categories} 中选择一个。行动主体是中国/国内的为"中国新闻"；凡涉及汽车行业或汽车企业（无论国内外），或来源为盖世汽车的，为"汽车相关"；行动主体是外国/国际且与汽车无关的，为"国际新闻"。
3. 网站：只能从 {sites} 中选择一个，参考来源 URL：
   人民日报 paper.people.com.cn；第一财经 www.yicai.com；澎湃新闻 www.thepaper.cn；新华网 www.xinhuanet.com 或 www.news.cn；盖世汽车 auto.gasgoo.com
4. 是否在历史新闻中出现过：对照助手消息中列出的历史标题，判断本条新闻的主题是否已经出现过，出现过填"是"，否则填"否"。

按如下 JSON 格式输出，不要输出其他任何文字：
{{
    "总结": "新闻总结",
    "标签": "新闻标签",
    "网站": "来源网站",
    "是否在历史新闻中出现过": "是或否"
}}"#,
            title = record.title,
            source = record.source,
        );

        let history = ctx
            .history
            .sorted()
            .into_iter()
            .map(|t| format!("标题：{t}"))
            .join("\n");
        let context = format!(
            "以下是已经出现过的新闻标题，供判断当前新闻是否重复：\n{}\n{}",
            ctx.today_so_far, history
        );

        ChatPrompt {
            system: SYSTEM_PROMPT.to_string(),
            context,
            user,
        }
    }

    /// Ask the model about one record.
    ///
    /// A reply cut off mid-JSON is re-asked once before it counts as malformed.
    #[instrument(level = "info", skip_all, fields(id = record.id))]
    pub async fn summarize(
        &self,
        record: &Record,
        ctx: SummaryContext<'_>,
    ) -> Result<Annotation, SummarizeError> {
        let prompt = self.build_prompt(record, ctx);
        let reply = self.ask(&prompt).await?;

        let verdict = match serde_json::from_str::<ModelVerdict>(&reply) {
            Err(e) if looks_truncated(&e) => {
                warn!(error = %e, "EOF while parsing; re-asking once");
                let again = self.ask(&prompt).await?;
                serde_json::from_str::<ModelVerdict>(&again)
                    .map_err(|e| malformed(&e, &again))?
            }
            parsed => parsed.map_err(|e| malformed(&e, &reply))?,
        };

        annotation_from(verdict)
    }

    async fn ask(&self, prompt: &ChatPrompt) -> Result<String, SummarizeError> {
        self.client
            .ask(prompt)
            .await
            .map_err(|e| SummarizeError::Request(e.to_string()))
    }

    /// Annotate every record, never dropping one.
    ///
    /// Up to `concurrency` requests are in flight at once. Results may finish
    /// in any order; each is written back to the record it was asked about,
    /// and the output keeps the input order.
    #[instrument(level = "info", skip_all, fields(count = records.len(), concurrency = concurrency))]
    pub async fn annotate_batch(
        &self,
        records: Vec<Record>,
        history: &HistoricalTitles,
        concurrency: usize,
    ) -> BatchReport {
        // Context for record i lists every title before it, whatever its outcome
        let mut seen = String::new();
        let contexts: Vec<String> = records
            .iter()
            .map(|record| {
                let before = seen.clone();
                seen.push_str(&format!("标题：{}\n", record.title));
                before
            })
            .collect();

        let mut results: Vec<(usize, u64, Result<Annotation, SummarizeError>)> =
            stream::iter(records.iter().zip(contexts.iter()).enumerate())
                .map(|(index, (record, today_so_far))| async move {
                    debug!(index, id = record.id, title = %record.title, "Summarizing record");
                    let ctx = SummaryContext {
                        today_so_far,
                        history,
                    };
                    (index, record.id, self.summarize(record, ctx).await)
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::default();
        for (mut record, (_, id, result)) in records.into_iter().zip(results) {
            debug_assert_eq!(record.id, id);
            match result {
                Ok(annotation) => {
                    info!(id, category = %annotation.category, "Annotated record");
                    record.annotate(annotation);
                }
                Err(e) => {
                    warn!(id, title = %record.title, error = %e, "Summarization failed; using sentinel");
                    let reason = e.to_string();
                    record.annotate(Annotation::sentinel(&record, &reason));
                    report.failures.push((id, reason));
                }
            }
            report.records.push(record);
        }

        info!(
            processed = report.processed(),
            needs_review = report.needs_review(),
            flagged_duplicates = report.flagged_duplicates(),
            "Finished summarization batch"
        );
        report
    }
}

fn malformed(e: &serde_json::Error, reply: &str) -> SummarizeError {
    SummarizeError::Malformed(format!("{e} in {}", truncate_for_log(reply, 200)))
}

/// Check a verdict against the closed vocabularies.
fn annotation_from(verdict: ModelVerdict) -> Result<Annotation, SummarizeError> {
    let category =
        Category::from_label(&verdict.category).ok_or_else(|| SummarizeError::Vocabulary {
            field: "标签",
            value: verdict.category.clone(),
        })?;
    let source_site =
        SourceSite::from_label(&verdict.site).ok_or_else(|| SummarizeError::Vocabulary {
            field: "网站",
            value: verdict.site.clone(),
        })?;
    let is_duplicate = DuplicateFlag::from_label(&verdict.seen_before).ok_or_else(|| {
        SummarizeError::Vocabulary {
            field: "是否在历史新闻中出现过",
            value: verdict.seen_before.clone(),
        }
    })?;

    let summary = verdict.summary.trim().to_string();
    if summary.is_empty() {
        return Err(SummarizeError::Malformed("empty summary".into()));
    }

    Ok(Annotation {
        summary,
        category,
        source_site,
        is_duplicate,
    })
}
