//! 价格数据存储
//!
//! 每次请求都从存储重新加载完整数据集，写入时整体替换

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NiftyError, Result};
use crate::models::{Dataset, PriceRecord};

/// 数据文件列名
pub const STORAGE_COLUMNS: [&str; 6] = ["Date", "Symbol", "Open", "High", "Low", "Close"];

/// 存储抽象
///
/// `save` 必须整体替换，失败时不得留下部分写入的数据
pub trait PriceStore: Send + Sync {
    fn load(&self) -> Result<Dataset>;
    fn save(&self, dataset: &Dataset) -> Result<()>;
}

/// 基于 CSV 文件的存储
#[derive(Debug, Clone)]
pub struct CsvPriceStore {
    path: PathBuf,
}

impl CsvPriceStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_to(&self, path: &Path, dataset: &Dataset) -> std::result::Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        // 空数据集也要写出表头
        writer.write_record(STORAGE_COLUMNS)?;
        for record in dataset {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl PriceStore for CsvPriceStore {
    fn load(&self) -> Result<Dataset> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            log::error!("打开数据文件 {} 失败: {}", self.path.display(), e);
            NiftyError::StorageReadFailure(e.to_string())
        })?;

        let mut dataset = Vec::new();
        for (line, row) in reader.deserialize::<PriceRecord>().enumerate() {
            let record = row.map_err(|e| {
                log::error!("数据文件第 {} 行解析失败: {}", line + 2, e);
                NiftyError::StorageReadFailure(e.to_string())
            })?;
            dataset.push(record);
        }

        log::debug!("从 {} 加载 {} 条记录", self.path.display(), dataset.len());
        Ok(dataset)
    }

    fn save(&self, dataset: &Dataset) -> Result<()> {
        let tmp_path = self.tmp_path();

        if let Err(e) = self.write_to(&tmp_path, dataset) {
            let _ = fs::remove_file(&tmp_path);
            log::error!("写入临时文件 {} 失败: {}", tmp_path.display(), e);
            return Err(NiftyError::StorageWriteFailure(e.to_string()));
        }

        // 原子替换
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            log::error!("替换数据文件 {} 失败: {}", self.path.display(), e);
            NiftyError::StorageWriteFailure(e.to_string())
        })?;

        log::debug!("已保存 {} 条记录到 {}", dataset.len(), self.path.display());
        Ok(())
    }
}

/// 内存存储，仅用于测试
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    records: std::sync::Mutex<Dataset>,
    fail_reads: bool,
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryPriceStore {
    pub fn with_records(records: Dataset) -> Self {
        Self {
            records: std::sync::Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Dataset {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl PriceStore for MemoryPriceStore {
    fn load(&self) -> Result<Dataset> {
        if self.fail_reads {
            return Err(NiftyError::StorageReadFailure("simulated".into()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn save(&self, dataset: &Dataset) -> Result<()> {
        if self.fail_writes {
            return Err(NiftyError::StorageWriteFailure("simulated".into()));
        }
        *self.records.lock().unwrap() = dataset.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(symbol: &str, y: i32, m: u32, d: u32, close: f64) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            symbol: symbol.to_string(),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
        }
    }

    /// 测试 CSV 存储的保存与加载
    #[test]
    fn test_csv_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path().join("prices.csv"));

        let dataset = vec![record("INFY", 2020, 1, 2, 700.5), record("TCS", 2020, 1, 3, 2100.0)];
        store.save(&dataset).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("Date,Symbol,Open,High,Low,Close\n"));
        assert!(content.contains("2020-01-02,INFY,699.5,702.5,698.5,700.5"));
        assert!(!store.tmp_path().exists());

        assert_eq!(store.load().unwrap(), dataset);
    }

    /// 测试空数据集仍写出表头
    #[test]
    fn test_csv_store_empty_dataset_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path().join("prices.csv"));

        store.save(&Vec::new()).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "Date,Symbol,Open,High,Low,Close");
        assert!(store.load().unwrap().is_empty());
    }

    /// 测试兼容带时间部分的日期与多余的列
    #[test]
    fn test_csv_store_tolerates_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(
            &path,
            "Date,Symbol,Series,Open,High,Low,Close,Volume\n\
             2007-11-27 00:00:00,MUNDRAPORT,EQ,770.0,1050.0,770.0,962.9,27294366\n",
        )
        .unwrap();

        let dataset = CsvPriceStore::new(&path).load().unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset[0].date, NaiveDate::from_ymd_opt(2007, 11, 27).unwrap());
        assert_eq!(dataset[0].symbol, "MUNDRAPORT");
        assert_eq!(dataset[0].close, 962.9);
    }

    #[test]
    fn test_csv_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path().join("missing.csv"));
        assert!(matches!(store.load(), Err(NiftyError::StorageReadFailure(_))));
    }

    #[test]
    fn test_csv_store_corrupt_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, "Date,Symbol,Open,High,Low,Close\n2020-01-02,INFY,abc,1,1,1\n").unwrap();
        assert!(matches!(
            CsvPriceStore::new(&path).load(),
            Err(NiftyError::StorageReadFailure(_))
        ));
    }

    #[test]
    fn test_csv_store_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path().join("no_such_dir").join("prices.csv"));
        assert!(matches!(
            store.save(&vec![record("INFY", 2020, 1, 2, 1.0)]),
            Err(NiftyError::StorageWriteFailure(_))
        ));
    }
}
