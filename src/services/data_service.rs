use crate::config::Config;
use crate::data_provider::SnapshotStore;
use crate::errors::Result;
use crate::models::stock::{Snapshot, StockDetailRecord, StockSummaryRecord};
use crate::scrapers::detail::extract_details;
use crate::scrapers::summary::extract_stocks;
use crate::scrapers::variable_income::extract_variable_income;
use crate::scrapers::PageLayout;
use crate::session::{PageSession, SessionOpener};
use crate::util::normalize_symbol;
use log::{info, warn};
use std::collections::HashSet;
use std::time::Duration;

/// 一次抓取的结果与被跳过的详情行数
#[derive(Debug)]
pub struct ScrapeResult {
    pub snapshot: Snapshot,
    pub skipped_rows: usize,
}

/// 抓取周期统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub stocks: usize,
    pub variable_income: bool,
    pub details: usize,
    pub skipped_rows: usize,
}

/// 数据服务：打开页面、抽取三类记录并发布快照
pub struct DataService<O> {
    opener: O,
    store: SnapshotStore,
    target_url: String,
    layout: PageLayout,
    wait_timeout: Duration,
}

impl<O: SessionOpener> DataService<O> {
    pub fn new(config: &Config, opener: O) -> Self {
        Self {
            opener,
            store: SnapshotStore::new(&config.data_dir),
            target_url: config.target_url.clone(),
            layout: config.layout.clone(),
            wait_timeout: config.wait_timeout,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// 打开页面并抽取数据，无论成功与否都会关闭浏览器
    pub async fn scrape(&self) -> Result<ScrapeResult> {
        let mut session = self.opener.open(&self.target_url).await?;
        let result = self.extract(&session).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close page session: {}", e);
        }
        result
    }

    async fn extract(&self, session: &O::Session) -> Result<ScrapeResult> {
        let html = session.rendered_document().await?;
        let stocks = extract_stocks(&html, &self.layout)?;
        let variable_income = extract_variable_income(&html, &self.layout)?;

        let outcome = extract_details(session, &self.layout, self.wait_timeout).await?;
        let mismatches = check_detail_symbols(&stocks, &outcome.records);
        if mismatches > 0 {
            warn!("{} detail records have no matching summary row", mismatches);
        }

        Ok(ScrapeResult {
            snapshot: Snapshot {
                stocks,
                variable_income,
                details: outcome.records,
            },
            skipped_rows: outcome.skipped.len(),
        })
    }

    pub fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        self.store.publish(snapshot)
    }

    /// 完整执行一个抓取并发布的周期
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        info!("Starting scrape cycle for {}", self.target_url);
        let result = self.scrape().await?;
        self.publish(&result.snapshot)?;

        let report = CycleReport::from(&result);
        info!("Scrape cycle finished: {:?}", report);
        Ok(report)
    }
}

impl From<&ScrapeResult> for CycleReport {
    fn from(result: &ScrapeResult) -> Self {
        Self {
            stocks: result.snapshot.stocks.len(),
            variable_income: result.snapshot.variable_income.is_some(),
            details: result.snapshot.details.len(),
            skipped_rows: result.skipped_rows,
        }
    }
}

/// 详情与汇总两次抽取互相独立，代码对不上只记录日志，详情照常保留
fn check_detail_symbols(stocks: &[StockSummaryRecord], details: &[StockDetailRecord]) -> usize {
    let known: HashSet<String> = stocks.iter().map(|s| normalize_symbol(&s.symbol)).collect();
    let mut mismatches = 0;
    for detail in details {
        if !known.contains(&detail.symbol_code) {
            warn!("Detail symbol {} does not appear in the summary table", detail.symbol_code);
            mismatches += 1;
        }
    }
    mismatches
}
