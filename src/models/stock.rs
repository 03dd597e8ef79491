use serde::{Deserialize, Serialize};

use crate::errors::{DataHubError, Result};

/// 行情汇总表中的一行
///
/// 所有字段都是页面显示的原始字符串（本地化格式），不做数值解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockSummaryRecord {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "simbolo")]
    pub symbol: String,
    #[serde(rename = "ultimo_precio")]
    pub last_price: String,
    #[serde(rename = "monto_efectivo")]
    pub cash_amount: String,
    #[serde(rename = "variacion")]
    pub variation: String,
    #[serde(rename = "titulos_negociados")]
    pub securities_traded: String,
}

impl StockSummaryRecord {
    pub const FIELDS: [&'static str; 6] = [
        "nombre",
        "simbolo",
        "ultimo_precio",
        "monto_efectivo",
        "variacion",
        "titulos_negociados",
    ];

    /// 按表格顺序由 6 个单元格构造
    pub fn from_cells(cells: &[String]) -> Result<Self> {
        match cells {
            [name, symbol, last_price, cash_amount, variation, securities_traded] => Ok(Self {
                name: name.clone(),
                symbol: symbol.clone(),
                last_price: last_price.clone(),
                cash_amount: cash_amount.clone(),
                variation: variation.clone(),
                securities_traded: securities_traded.clone(),
            }),
            _ => Err(DataHubError::MalformedPageError(format!(
                "Summary row needs {} cells, got {}",
                Self::FIELDS.len(),
                cells.len()
            ))),
        }
    }
}

/// 全市场"renta variable"汇总，每个抓取周期只有一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableIncomeRecord {
    #[serde(rename = "operaciones")]
    pub operations: String,
    #[serde(rename = "titulos_negociados")]
    pub securities_traded: String,
    #[serde(rename = "monto_en_efectivo_bs")]
    pub cash_amount: String,
    /// 页面显示的观测时间，如 "13:00"
    #[serde(rename = "hora")]
    pub observed_at: String,
}

impl VariableIncomeRecord {
    pub const FIELDS: [&'static str; 4] = [
        "operaciones",
        "titulos_negociados",
        "monto_en_efectivo_bs",
        "hora",
    ];

    pub fn from_cells(cells: &[String]) -> Result<Self> {
        match cells {
            [operations, securities_traded, cash_amount, observed_at] => Ok(Self {
                operations: operations.clone(),
                securities_traded: securities_traded.clone(),
                cash_amount: cash_amount.clone(),
                observed_at: observed_at.clone(),
            }),
            _ => Err(DataHubError::MalformedPageError(format!(
                "Variable income table needs {} cells, got {}",
                Self::FIELDS.len(),
                cells.len()
            ))),
        }
    }
}

/// 单只股票的详情面板
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockDetailRecord {
    #[serde(rename = "desc_simbolo")]
    pub name: String,
    /// 已规范化的代码，如 "BVL"
    #[serde(rename = "cod_simbolo")]
    pub symbol_code: String,
    #[serde(rename = "cod_isin")]
    pub isin: String,
    #[serde(rename = "acciones_circulacion")]
    pub shares_outstanding: String,
    #[serde(rename = "capitalizacion_en_mill")]
    pub market_cap: String,
    #[serde(rename = "moneda")]
    pub currency: String,
    #[serde(rename = "estado")]
    pub status: String,
    #[serde(rename = "ultimo_precio")]
    pub last_price: String,
    #[serde(rename = "cierre_anterior")]
    pub previous_close: String,
    #[serde(rename = "operaciones_del_dia")]
    pub day_operations: String,
    #[serde(rename = "titulos_del_dia")]
    pub day_securities: String,
    #[serde(rename = "efectivo_del_dia")]
    pub day_cash: String,
    #[serde(rename = "operaciones_anual")]
    pub year_operations: String,
    #[serde(rename = "titulos_anual")]
    pub year_securities: String,
    #[serde(rename = "efectivo_anual")]
    pub year_cash: String,
}

pub const DETAIL_FIELD_COUNT: usize = 15;

impl StockDetailRecord {
    /// 字段按详情面板的固定顺序传入
    pub fn from_fields(fields: [String; DETAIL_FIELD_COUNT]) -> Self {
        let [name, symbol_code, isin, shares_outstanding, market_cap, currency, status, last_price, previous_close, day_operations, day_securities, day_cash, year_operations, year_securities, year_cash] =
            fields;
        Self {
            name,
            symbol_code,
            isin,
            shares_outstanding,
            market_cap,
            currency,
            status,
            last_price,
            previous_close,
            day_operations,
            day_securities,
            day_cash,
            year_operations,
            year_securities,
            year_cash,
        }
    }
}

/// 一个抓取周期的完整结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub stocks: Vec<StockSummaryRecord>,
    pub variable_income: Option<VariableIncomeRecord>,
    pub details: Vec<StockDetailRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn summary_serializes_with_wire_names_in_order() {
        let record = StockSummaryRecord::from_cells(&cells(&[
            "Bco. de Venezuela", "BVL", "12,50", "1.000,00", "0,40", "80",
        ]))
        .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"nombre":"Bco. de Venezuela","simbolo":"BVL","ultimo_precio":"12,50","monto_efectivo":"1.000,00","variacion":"0,40","titulos_negociados":"80"}"#
        );
    }

    #[test]
    fn summary_rejects_short_rows() {
        let err = StockSummaryRecord::from_cells(&cells(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, DataHubError::MalformedPageError(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{"operaciones":"1","titulos_negociados":"2","monto_en_efectivo_bs":"3","hora":"13:00","extra":"x"}"#;
        assert!(serde_json::from_str::<VariableIncomeRecord>(json).is_err());
    }

    #[test]
    fn missing_keys_are_rejected() {
        let json = r#"{"operaciones":"1","titulos_negociados":"2","hora":"13:00"}"#;
        assert!(serde_json::from_str::<VariableIncomeRecord>(json).is_err());
    }

    #[test]
    fn detail_fields_map_in_panel_order() {
        let fields: [String; DETAIL_FIELD_COUNT] = std::array::from_fn(|i| format!("f{}", i));
        let record = StockDetailRecord::from_fields(fields);
        assert_eq!(record.name, "f0");
        assert_eq!(record.symbol_code, "f1");
        assert_eq!(record.status, "f6");
        assert_eq!(record.year_cash, "f14");
    }
}
