use crate::errors::Result;
use crate::models::stock::VariableIncomeRecord;
use crate::scrapers::{non_empty_cells, PageLayout};
use log::info;
use scraper::Html;

/// 解析"renta variable"汇总表
///
/// 非交易时段该表可能为空或不存在，此时返回 `None`。
pub fn extract_variable_income(html: &str, layout: &PageLayout) -> Result<Option<VariableIncomeRecord>> {
    let document = Html::parse_document(html);
    let cells = match non_empty_cells(&document, &layout.variable_income_table_id)? {
        Some(cells) if !cells.is_empty() => cells,
        _ => {
            info!("Variable income table #{} is empty", layout.variable_income_table_id);
            return Ok(None);
        }
    };

    VariableIncomeRecord::from_cells(&cells).map(Some)
}
