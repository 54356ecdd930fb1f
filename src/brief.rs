//! Daily brief rendering.
//!
//! Annotated records are grouped into three fixed sections, always in the
//! order China / International / Automotive, and rendered as Markdown:
//!
//! ```text
//! output_dir/
//! └── 2025年05月06日 新闻简报.md
//! ```
//!
//! Within a section records keep their collection order.

use crate::models::{Category, Record};
use crate::utils::cn_date;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct BriefOptions {
    /// Leave out records the model flagged as repeats.
    pub omit_flagged_duplicates: bool,
}

/// Records filed per section. Every category is present, possibly empty.
pub fn group_by_category(
    records: &[Record],
    options: BriefOptions,
) -> BTreeMap<Category, Vec<&Record>> {
    let mut sections: BTreeMap<Category, Vec<&Record>> =
        Category::ALL.into_iter().map(|c| (c, Vec::new())).collect();

    for record in records {
        let Some(category) = record.category.filter(|_| record.is_annotated()) else {
            warn!(id = record.id, title = %record.title, "Record is not annotated; left out of the brief");
            continue;
        };
        if options.omit_flagged_duplicates && record.flagged_duplicate() {
            info!(id = record.id, title = %record.title, "Omitting model-flagged repeat");
            continue;
        }
        sections.entry(category).or_default().push(record);
    }
    sections
}

pub fn render_markdown(
    date: NaiveDate,
    records: &[Record],
    options: BriefOptions,
) -> Result<String, fmt::Error> {
    let date_cn = cn_date(date);
    let mut md = String::new();

    writeln!(md, "<div align=\"right\"><small>机密文件</small></div>\n")?;
    writeln!(md, "# {date_cn} 新闻简报\n")?;

    for (category, items) in group_by_category(records, options) {
        writeln!(md, "## {}\n", category.section_title())?;
        if items.is_empty() {
            writeln!(md, "暂无相关新闻\n")?;
            continue;
        }

        for (i, record) in items.iter().enumerate() {
            if i > 0 {
                writeln!(md, "---\n")?;
            }
            let site = record
                .source_site
                .map(|s| s.label())
                .unwrap_or("check");
            writeln!(md, "**标题：{}**  ", record.title)?;
            writeln!(md, "**来源：[{}]({})**  ", site, record.source)?;
            writeln!(md, "摘要：{}\n", record.summary.as_deref().unwrap_or(""))?;
        }
    }

    writeln!(md, "<div align=\"center\"><small>{date_cn}</small></div>")?;
    Ok(md)
}

pub fn brief_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("{} 新闻简报.md", cn_date(date)))
}

/// Render and write the brief, returning the file path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %date, count = records.len()))]
pub async fn write_brief(
    output_dir: &Path,
    date: NaiveDate,
    records: &[Record],
    options: BriefOptions,
) -> Result<PathBuf, Box<dyn Error>> {
    let md = render_markdown(date, records, options)?;
    fs::create_dir_all(output_dir).await?;
    let path = brief_path(output_dir, date);
    fs::write(&path, md).await?;
    info!(path = %path.display(), "Wrote daily brief");
    Ok(path)
}
