pub mod detail;
pub mod summary;
pub mod variable_income;

use crate::errors::{DataHubError, Result};
use crate::models::stock::DETAIL_FIELD_COUNT;
use crate::util::clean_text;
use scraper::{Html, Selector};

/// 行情页面上所依赖的元素标识
///
/// 页面改版时只需要调整这里。
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub summary_table_id: String,
    pub variable_income_table_id: String,
    /// 带"查看详情"交互的行
    pub row_selector: String,
    pub detail_panel_id: String,
    pub detail_close_selector: Option<String>,
    /// 详情面板内 15 个字段的 id，顺序与 `StockDetailRecord` 一致
    pub detail_field_ids: [String; DETAIL_FIELD_COUNT],
}

impl Default for PageLayout {
    fn default() -> Self {
        let ids = [
            "desc-simbolo",
            "cod-simbolo",
            "cod-isin",
            "acciones-circulacion",
            "capitalizacion",
            "moneda",
            "estado",
            "ultimo-precio",
            "cierre-anterior",
            "operaciones-dia",
            "titulos-dia",
            "efectivo-dia",
            "operaciones-anual",
            "titulos-anual",
            "efectivo-anual",
        ];
        Self {
            summary_table_id: "tbl-resumen-mercado".to_string(),
            variable_income_table_id: "tbody-rentavariable".to_string(),
            row_selector: "#tbl-resumen-mercado tr[data-simbolo]".to_string(),
            detail_panel_id: "detalle-simbolo".to_string(),
            detail_close_selector: Some("#detalle-simbolo [data-dismiss]".to_string()),
            detail_field_ids: ids.map(String::from),
        }
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| DataHubError::MalformedPageError(format!("Bad selector {}: {:?}", css, e)))
}

/// 按文档顺序收集某个元素下所有非空 `td` 的文本
///
/// 页面用空单元格做排版，必须在分组前过滤掉。元素不存在时返回 `None`。
pub(crate) fn non_empty_cells(document: &Html, container_id: &str) -> Result<Option<Vec<String>>> {
    let container_selector = parse_selector(&format!("#{}", container_id))?;
    let cell_selector = parse_selector("td")?;

    let container = match document.select(&container_selector).next() {
        Some(container) => container,
        None => return Ok(None),
    };

    let cells = container
        .select(&cell_selector)
        .map(|td| clean_text(&td.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    Ok(Some(cells))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layout_cells_are_dropped() {
        let html = Html::parse_document(
            r#"<table id="t"><tr><td> a </td><td></td><td>&nbsp;</td><td><span>b</span> <i>c</i></td></tr></table>"#,
        );
        let cells = non_empty_cells(&html, "t").unwrap().unwrap();
        assert_eq!(cells, vec!["a".to_string(), "b c".to_string()]);
    }

    #[test]
    fn absent_container_is_none() {
        let html = Html::parse_document("<p>nothing</p>");
        assert!(non_empty_cells(&html, "t").unwrap().is_none());
    }

    #[test]
    fn default_layout_has_distinct_field_ids() {
        let layout = PageLayout::default();
        let mut ids: Vec<_> = layout.detail_field_ids.iter().collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), DETAIL_FIELD_COUNT);
    }
}
