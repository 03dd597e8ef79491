// 公开导出的模块，供外部使用
pub mod data_provider;
pub mod errors;
pub mod models;

// 抓取与服务相关模块，主程序使用
pub mod config;
pub mod logger;
pub mod scrapers;
pub mod services;
pub mod session;
pub mod util;

// 重新导出常用类型，方便使用
pub use data_provider::SnapshotStore;
pub use errors::{DataHubError, Result};
pub use models::stock::{Snapshot, StockDetailRecord, StockSummaryRecord, VariableIncomeRecord};
