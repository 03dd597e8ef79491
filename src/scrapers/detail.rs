use crate::errors::{DataHubError, Result};
use crate::models::stock::{StockDetailRecord, DETAIL_FIELD_COUNT};
use crate::scrapers::{parse_selector, PageLayout};
use crate::session::PageSession;
use crate::util::{clean_text, normalize_symbol};
use log::{debug, error, info, warn};
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;

/// 被跳过的一行及原因
#[derive(Debug)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: DataHubError,
}

/// 逐行抓取的结果：成功的记录与被跳过的行
#[derive(Debug, Default)]
pub struct DetailOutcome {
    pub records: Vec<StockDetailRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// 依次点击每一行，等待详情面板出现后读取字段
///
/// 单行失败（超时、元素失效、字段缺失）只跳过该行，不影响其余行。
/// 只有定位行本身失败时才返回错误。
pub async fn extract_details<S: PageSession>(
    session: &S,
    layout: &PageLayout,
    timeout: Duration,
) -> Result<DetailOutcome> {
    let rows = session.locate_interactive_rows(&layout.row_selector).await?;
    info!("Extracting details for {} rows", rows.len());

    let mut outcome = DetailOutcome::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let result = extract_row(session, row, layout, timeout).await.and_then(|record| {
            // 面板未刷新时会读到上一行的内容
            if seen.insert(record.symbol_code.clone()) {
                Ok(record)
            } else {
                Err(DataHubError::MalformedPageError(format!(
                    "Duplicate symbol code {}",
                    record.symbol_code
                )))
            }
        });

        match result {
            Ok(record) => {
                debug!("Row {}: {} ({})", index, record.symbol_code, record.name);
                outcome.records.push(record);
            }
            Err(reason) => {
                if reason.is_row_recoverable() {
                    warn!("Skipping detail row {}: {}", index, reason);
                } else {
                    error!("Skipping detail row {}: {}", index, reason);
                }
                outcome.skipped.push(SkippedRow { index, reason });
            }
        }

        if let Some(close) = &layout.detail_close_selector {
            if let Err(e) = session.dismiss(close).await {
                debug!("Could not dismiss detail panel after row {}: {}", index, e);
            }
        }
    }

    info!(
        "Extracted {} detail records, skipped {} rows",
        outcome.records.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

async fn extract_row<S: PageSession>(
    session: &S,
    row: &S::Handle,
    layout: &PageLayout,
    timeout: Duration,
) -> Result<StockDetailRecord> {
    session.click(row).await?;
    session.wait_for_visible(&layout.detail_panel_id, timeout).await?;
    let html = session.rendered_document().await?;
    parse_detail_panel(&html, layout)
}

/// 从当前可见的详情面板读取 15 个字段
pub fn parse_detail_panel(html: &str, layout: &PageLayout) -> Result<StockDetailRecord> {
    let document = Html::parse_document(html);
    let panel_selector = parse_selector(&format!("#{}", layout.detail_panel_id))?;
    let panel = document.select(&panel_selector).next().ok_or_else(|| {
        DataHubError::MalformedPageError(format!("Detail panel #{} not found", layout.detail_panel_id))
    })?;

    let mut values = Vec::with_capacity(DETAIL_FIELD_COUNT);
    for id in &layout.detail_field_ids {
        let selector = parse_selector(&format!("#{}", id))?;
        let field = panel
            .select(&selector)
            .next()
            .ok_or_else(|| DataHubError::MalformedPageError(format!("Detail field #{} not found", id)))?;
        values.push(clean_text(&field.text().collect::<String>()));
    }

    let mut fields: [String; DETAIL_FIELD_COUNT] = values
        .try_into()
        .map_err(|_| DataHubError::MalformedPageError("Detail field count mismatch".to_string()))?;

    fields[1] = normalize_symbol(&fields[1]);
    if fields[1].is_empty() {
        return Err(DataHubError::MalformedPageError("Detail panel has an empty symbol code".to_string()));
    }

    Ok(StockDetailRecord::from_fields(fields))
}
