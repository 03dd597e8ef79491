use crate::errors::{DataHubError, Result};
use crate::models::stock::StockSummaryRecord;
use crate::scrapers::{non_empty_cells, PageLayout};
use log::{debug, info};
use scraper::Html;

/// 解析行情汇总表
///
/// 非空单元格按 6 个一组对应一行；数量不是 6 的倍数说明页面结构变了，
/// 此时报错而不是生成一条被截断的记录。
pub fn extract_stocks(html: &str, layout: &PageLayout) -> Result<Vec<StockSummaryRecord>> {
    let document = Html::parse_document(html);
    let cells = non_empty_cells(&document, &layout.summary_table_id)?.ok_or_else(|| {
        DataHubError::MalformedPageError(format!("Summary table #{} not found", layout.summary_table_id))
    })?;

    let width = StockSummaryRecord::FIELDS.len();
    if cells.len() % width != 0 {
        return Err(DataHubError::MalformedPageError(format!(
            "Summary table has {} cells, not a multiple of {}",
            cells.len(),
            width
        )));
    }
    debug!("Summary table yielded {} cells", cells.len());

    let stocks = cells
        .chunks_exact(width)
        .map(StockSummaryRecord::from_cells)
        .collect::<Result<Vec<_>>>()?;

    info!("Extracted {} summary rows", stocks.len());
    Ok(stocks)
}
