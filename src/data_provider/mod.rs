use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::errors::{DataHubError, Result};
use crate::models::stock::{Snapshot, StockDetailRecord, StockSummaryRecord, VariableIncomeRecord};
use crate::util::normalize_symbol;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub const STOCKS: &str = "stocks";
pub const VARIABLE_INCOME: &str = "renta_variable";
pub const DETAILS: &str = "stocks_details";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 快照存储：每类记录一个 JSON 文件，整体覆盖写入
///
/// 写入先落到同目录的临时文件再 rename，读者要么看到旧文件，要么看到完整的新文件。
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// 序列化并原子替换 `name` 对应的文件
    pub fn write<T: Serialize>(&self, name: &str, records: &[T]) -> Result<()> {
        let path = self.path_for(name);

        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut ser)?;
        buf.push(b'\n');

        fs::create_dir_all(&self.dir).map_err(|e| DataHubError::store(&self.dir, e))?;

        let tmp = self.dir.join(format!(
            ".{}.json.{}.{}.tmp",
            name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = write_synced(&tmp, &buf).and_then(|_| fs::rename(&tmp, &path)) {
            // 旧文件保持不变，只清理临时文件
            let _ = fs::remove_file(&tmp);
            return Err(DataHubError::store(&path, e));
        }

        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| DataHubError::store(&path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 快照文件的最后修改时间
    pub fn modified(&self, name: &str) -> Result<SystemTime> {
        let path = self.path_for(name);
        fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|e| DataHubError::store(&path, e))
    }

    /// 发布一个周期的抓取结果
    ///
    /// 三个文件每个周期都整体覆盖；没有 renta variable 数据时写入空列表。
    pub fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        self.write(STOCKS, &snapshot.stocks)?;
        if snapshot.variable_income.is_none() {
            info!("No variable income data this cycle, publishing empty {}", VARIABLE_INCOME);
        }
        self.write(VARIABLE_INCOME, snapshot.variable_income.as_slice())?;
        self.write(DETAILS, &snapshot.details)?;

        info!(
            "Published {} stocks and {} details to {}",
            snapshot.stocks.len(),
            snapshot.details.len(),
            self.dir.display()
        );
        Ok(())
    }

    pub fn stocks(&self) -> Result<Vec<StockSummaryRecord>> {
        self.read(STOCKS)
    }

    pub fn variable_income(&self) -> Result<Vec<VariableIncomeRecord>> {
        self.read(VARIABLE_INCOME)
    }

    pub fn details(&self) -> Result<Vec<StockDetailRecord>> {
        self.read(DETAILS)
    }

    /// 按规范化后的完整代码精确匹配
    pub fn find_detail(&self, code: &str) -> Result<Option<StockDetailRecord>> {
        let wanted = normalize_symbol(code);
        Ok(self
            .details()?
            .into_iter()
            .find(|detail| normalize_symbol(&detail.symbol_code) == wanted))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::stock::DETAIL_FIELD_COUNT;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    pub(crate) fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("bvc_datahub_{}_{}_{}", tag, std::process::id(), nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub(crate) fn detail(code: &str) -> StockDetailRecord {
        let mut fields: [String; DETAIL_FIELD_COUNT] = std::array::from_fn(|i| format!("{}-{}", code, i));
        fields[1] = code.to_string();
        StockDetailRecord::from_fields(fields)
    }

    fn stock(i: usize) -> StockSummaryRecord {
        StockSummaryRecord {
            name: format!("Empresa {}", i),
            symbol: format!("S{}", i),
            last_price: format!("{},50", i),
            cash_amount: "1.234,00".to_string(),
            variation: "-0,25".to_string(),
            securities_traded: "1.000".to_string(),
        }
    }

    #[test]
    fn read_returns_what_was_written() {
        let store = SnapshotStore::new(temp_dir("roundtrip"));
        let stocks: Vec<_> = (0..3).map(stock).collect();
        store.write(STOCKS, &stocks).unwrap();
        assert_eq!(store.stocks().unwrap(), stocks);

        let income = vec![VariableIncomeRecord {
            operations: "35".into(),
            securities_traded: "12.000".into(),
            cash_amount: "99.000,00".into(),
            observed_at: "13:00".into(),
        }];
        store.write(VARIABLE_INCOME, &income).unwrap();
        assert_eq!(store.variable_income().unwrap(), income);
    }

    #[test]
    fn file_is_indented_and_keeps_field_order() {
        let store = SnapshotStore::new(temp_dir("format"));
        store.write(STOCKS, &[stock(1)]).unwrap();
        let text = fs::read_to_string(store.path_for(STOCKS)).unwrap();
        assert!(text.starts_with("[\n    {\n        \"nombre\": \"Empresa 1\",\n        \"simbolo\": \"S1\""));
        let order: Vec<_> = StockSummaryRecord::FIELDS.iter().map(|f| text.find(f).unwrap()).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn overwrite_replaces_previous_contents() {
        let store = SnapshotStore::new(temp_dir("overwrite"));
        store.write(STOCKS, &(0..5).map(stock).collect::<Vec<_>>()).unwrap();
        store.write(STOCKS, &[stock(9)]).unwrap();
        assert_eq!(store.stocks().unwrap(), vec![stock(9)]);

        // 没有遗留临时文件
        let leftovers = fs::read_dir(store.dir()).unwrap().filter_map(|e| e.ok()).count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn missing_and_corrupt_files_are_errors() {
        let store = SnapshotStore::new(temp_dir("missing"));
        assert!(matches!(store.stocks(), Err(DataHubError::StoreIOError { .. })));

        fs::write(store.path_for(STOCKS), "[{\"nombre\": ").unwrap();
        assert!(matches!(store.stocks(), Err(DataHubError::JsonError(_))));
    }

    #[test]
    fn failed_write_keeps_previous_snapshot() {
        let dir = temp_dir("failed");
        let store = SnapshotStore::new(&dir);
        store.write(STOCKS, &[stock(1)]).unwrap();

        // 目标路径被目录占用时 rename 失败
        let details_path = store.path_for(DETAILS);
        fs::create_dir_all(details_path.join("occupied")).unwrap();
        let err = store.write(DETAILS, &[detail("BVL")]).unwrap_err();
        assert!(matches!(err, DataHubError::StoreIOError { .. }));
        assert_eq!(store.stocks().unwrap(), vec![stock(1)]);
    }

    #[test]
    fn publish_empties_variable_income_when_absent() {
        let store = SnapshotStore::new(temp_dir("publish"));
        let income = VariableIncomeRecord {
            operations: "1".into(),
            securities_traded: "2".into(),
            cash_amount: "3".into(),
            observed_at: "10:30".into(),
        };
        store
            .publish(&Snapshot {
                stocks: vec![stock(1)],
                variable_income: Some(income.clone()),
                details: vec![detail("BVL")],
            })
            .unwrap();
        assert_eq!(store.variable_income().unwrap(), vec![income]);

        store
            .publish(&Snapshot {
                stocks: vec![stock(2)],
                variable_income: None,
                details: vec![],
            })
            .unwrap();

        assert_eq!(store.stocks().unwrap(), vec![stock(2)]);
        // 不能把上一周期的数据和本周期的行情混在一起
        assert!(store.variable_income().unwrap().is_empty());
        assert!(store.details().unwrap().is_empty());
    }

    #[test]
    fn detail_lookup_is_case_and_punctuation_insensitive() {
        let store = SnapshotStore::new(temp_dir("lookup"));
        store.write(DETAILS, &[detail("BVL"), detail("BVCC"), detail("TDVD")]).unwrap();

        assert_eq!(store.find_detail("bvl").unwrap().unwrap().symbol_code, "BVL");
        assert_eq!(store.find_detail("T.D.V.D").unwrap().unwrap().symbol_code, "TDVD");
        // 不做前缀匹配
        assert_eq!(store.find_detail("BVC").unwrap(), None);
        assert_eq!(store.find_detail("ZZZ").unwrap(), None);
    }

    #[test]
    fn concurrent_reads_never_see_partial_writes() {
        let store = Arc::new(SnapshotStore::new(temp_dir("atomic")));
        let small: Vec<_> = (0..20).map(stock).collect();
        let large: Vec<_> = (0..400).map(stock).collect();
        store.write(STOCKS, &small).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            let (small, large) = (small.clone(), large.clone());
            thread::spawn(move || {
                for i in 0..100 {
                    let records = if i % 2 == 0 { &large } else { &small };
                    store.write(STOCKS, records).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut reads = 0;
        while !done.load(Ordering::SeqCst) || reads < 50 {
            let seen = store.stocks().expect("reader observed a torn snapshot");
            assert!(seen == small || seen == large);
            reads += 1;
        }
        writer.join().unwrap();
    }
}
