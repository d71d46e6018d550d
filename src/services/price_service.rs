//! 价格数据服务
//!
//! 写入流程：RECEIVED → SCHEMA_OK → NOT_DUPLICATE → WITHIN_ENVELOPE → APPENDED，
//! 任一阶段失败立即返回该阶段的错误，后续阶段不再执行。
//! 读取-校验-写入整个过程持有写锁，避免并发写入同一 (symbol, date)。

use std::fmt;
use std::sync::Arc;

use actix_web::web;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{NiftyError, Result};
use crate::models::{Dataset, PriceRow};
use crate::services::query;
use crate::services::schema::SchemaValidator;
use crate::services::store::PriceStore;
use crate::services::validation;

/// 写入流程的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Received,
    SchemaOk,
    NotDuplicate,
    WithinEnvelope,
    Appended,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStage::Received => "RECEIVED",
            WriteStage::SchemaOk => "SCHEMA_OK",
            WriteStage::NotDuplicate => "NOT_DUPLICATE",
            WriteStage::WithinEnvelope => "WITHIN_ENVELOPE",
            WriteStage::Appended => "APPENDED",
        };
        f.write_str(name)
    }
}

pub struct PriceService {
    store: Arc<dyn PriceStore>,
    schema: SchemaValidator,
    write_lock: Mutex<()>,
}

impl PriceService {
    pub fn new(store: Arc<dyn PriceStore>, schema: SchemaValidator) -> Self {
        Self {
            store,
            schema,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Dataset> {
        let store = self.store.clone();
        web::block(move || store.load())
            .await
            .map_err(|e| NiftyError::StorageReadFailure(e.to_string()))?
    }

    async fn save(&self, dataset: Dataset) -> Result<()> {
        let store = self.store.clone();
        web::block(move || store.save(&dataset))
            .await
            .map_err(|e| NiftyError::StorageWriteFailure(e.to_string()))?
    }

    /// 查询价格数据
    pub async fn get_prices(&self, symbol: &str, year: Option<&str>) -> Result<Vec<PriceRow>> {
        if symbol.trim().is_empty() {
            return Err(NiftyError::MissingParameter);
        }
        let year = query::parse_year(year)?;

        let history = self.load().await?;
        query::query(&history, symbol, year)
            .ok_or_else(|| NiftyError::SymbolNotFound(symbol.to_string()))
    }

    /// 新增一条价格记录，成功时原样返回请求内容
    pub async fn create_price(&self, body: &[u8]) -> Result<Value> {
        let mut stage = WriteStage::Received;
        match self.run_write_pipeline(body, &mut stage).await {
            Ok(document) => Ok(document),
            Err(e) => {
                log::warn!("写入在 {} 之后被拒绝: {}", stage, e);
                Err(e)
            }
        }
    }

    async fn run_write_pipeline(&self, body: &[u8], stage: &mut WriteStage) -> Result<Value> {
        let document: Value =
            serde_json::from_slice(body).map_err(|_| NiftyError::MalformedRequestBody)?;

        let submission = self.schema.validate_submission(&document)?;
        *stage = WriteStage::SchemaOk;

        let _guard = self.write_lock.lock().await;
        let mut history = self.load().await?;

        if validation::check_duplicate(&history, &submission.symbol, submission.date) {
            return Err(NiftyError::DuplicateRecord {
                symbol: submission.symbol,
                date: submission.date,
            });
        }
        *stage = WriteStage::NotDuplicate;

        validation::check_outlier(&history, &submission)?;
        *stage = WriteStage::WithinEnvelope;

        history.push(submission.to_record());
        self.save(history).await?;
        *stage = WriteStage::Appended;

        log::info!("已写入 {} {} ({})", submission.symbol, submission.date, stage);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceRecord;
    use crate::services::store::MemoryPriceStore;
    use chrono::NaiveDate;
    use serde_json::json;

    const CREATE_SCHEMA: &str = include_str!("../../schema/stocks/create.json");

    fn record(date: &str, close: f64) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            symbol: "INFY".to_string(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    // open/high/low/close 在三天内均为 10, 12, 14 -> mean 12, std 2
    fn seeded_store() -> Arc<MemoryPriceStore> {
        Arc::new(MemoryPriceStore::with_records(vec![
            record("2020-01-01", 10.0),
            record("2020-01-02", 12.0),
            record("2020-01-03", 14.0),
        ]))
    }

    fn build_service(store: Arc<MemoryPriceStore>) -> PriceService {
        PriceService::new(store, SchemaValidator::from_json(CREATE_SCHEMA).unwrap())
    }

    fn body(date: &str, price: f64) -> Vec<u8> {
        json!({
            "symbol": "INFY",
            "date": date,
            "open": price,
            "high": price,
            "low": price,
            "close": price
        })
        .to_string()
        .into_bytes()
    }

    #[actix_web::test]
    async fn test_create_then_read_round_trip() {
        let store = seeded_store();
        let service = build_service(store.clone());

        let accepted = service.create_price(&body("04/01/2020", 13.5)).await.unwrap();
        assert_eq!(accepted["date"], "04/01/2020");
        assert_eq!(store.snapshot().len(), 4);

        let rows = service.get_prices("INFY", None).await.unwrap();
        assert_eq!(rows[0].date, "2020-01-04");
        assert_eq!(rows[0].close, 13.5);
        assert_eq!(rows.len(), 4);
    }

    #[actix_web::test]
    async fn test_duplicate_rejected_regardless_of_prices() {
        let service = build_service(seeded_store());
        let err = service.create_price(&body("02/01/2020", 12.0)).await.unwrap_err();
        assert!(matches!(err, NiftyError::DuplicateRecord { .. }));
        let err = service.create_price(&body("02/01/2020", 999.0)).await.unwrap_err();
        assert!(matches!(err, NiftyError::DuplicateRecord { .. }));
    }

    #[actix_web::test]
    async fn test_outlier_rejected_and_not_saved() {
        let store = seeded_store();
        let service = build_service(store.clone());
        let err = service.create_price(&body("04/01/2020", 15.0)).await.unwrap_err();
        match err {
            NiftyError::OutlierRejected(v) => assert_eq!(v.len(), 4),
            other => panic!("意外的错误: {:?}", other),
        }
        assert_eq!(store.snapshot().len(), 3);
    }

    #[actix_web::test]
    async fn test_schema_failure_skips_storage() {
        let store = Arc::new(MemoryPriceStore::failing_reads());
        let service = build_service(store);
        // 结构错误在读取存储之前返回
        let err = service
            .create_price(br#"{"symbol": "INFY", "date": "2020-01-04"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, NiftyError::SchemaViolation(_)));

        let err = service.create_price(&body("2020-01-04", 12.0)).await.unwrap_err();
        assert!(matches!(err, NiftyError::InvalidDateFormat));
    }

    #[actix_web::test]
    async fn test_malformed_body() {
        let service = build_service(seeded_store());
        let err = service.create_price(b"not json").await.unwrap_err();
        assert!(matches!(err, NiftyError::MalformedRequestBody));
    }

    #[actix_web::test]
    async fn test_storage_failures_surface() {
        let store = Arc::new(MemoryPriceStore::failing_writes());
        let service = build_service(store);
        let err = service.create_price(&body("04/01/2020", 12.0)).await.unwrap_err();
        assert!(matches!(err, NiftyError::StorageWriteFailure(_)));

        let service = build_service(Arc::new(MemoryPriceStore::failing_reads()));
        let err = service.get_prices("INFY", None).await.unwrap_err();
        assert!(matches!(err, NiftyError::StorageReadFailure(_)));
    }

    #[actix_web::test]
    async fn test_read_errors() {
        let service = build_service(seeded_store());
        assert!(matches!(
            service.get_prices("  ", None).await,
            Err(NiftyError::MissingParameter)
        ));
        assert!(matches!(
            service.get_prices("INFY", Some("twenty")).await,
            Err(NiftyError::InvalidYear(_))
        ));
        assert!(matches!(
            service.get_prices("WIPRO", None).await,
            Err(NiftyError::SymbolNotFound(_))
        ));
        assert!(service.get_prices("INFY", Some("2019")).await.unwrap().is_empty());
    }

    /// 并发写入同一 (symbol, date) 只有一个成功
    #[actix_web::test]
    async fn test_concurrent_duplicate_writes_serialized() {
        let store = seeded_store();
        let service = build_service(store.clone());
        let first = body("04/01/2020", 12.0);
        let second = body("04/01/2020", 12.5);

        let (a, b) = tokio::join!(service.create_price(&first), service.create_price(&second));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.snapshot().len(), 4);
    }
}
