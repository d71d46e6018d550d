//! 日线价格数据模型
//!
//! 定义存储记录、查询输出和写入请求的数据结构

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// 写入请求中的日期格式（DD/MM/YYYY）
pub const SUBMISSION_DATE_FORMAT: &str = "%d/%m/%Y";

/// 输出日期格式（ISO）
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// 单条日线价格记录
///
/// 字段名与数据文件的列名保持一致（首字母大写）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "Date", deserialize_with = "deserialize_storage_date")]
    pub date: NaiveDate,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
}

impl PriceRecord {
    /// 按字段名取价格
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }
}

/// 全部价格记录，存储中不保证任何顺序
pub type Dataset = Vec<PriceRecord>;

// 数据文件中的日期可能带有时间部分，只取日期
fn deserialize_storage_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_storage_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("无法解析日期: {}", raw))
    })
}

pub fn parse_storage_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// 受监控的价格字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    /// 离群检查的字段顺序
    pub const CHECK_ORDER: [PriceField; 4] =
        [PriceField::Close, PriceField::Open, PriceField::High, PriceField::Low];

    pub fn name(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        }
    }
}

/// 查询输出的单行数据
///
/// 字段名小写，日期为 ISO 格式，不包含 symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&PriceRecord> for PriceRow {
    fn from(record: &PriceRecord) -> Self {
        Self {
            date: record.date.format(ISO_DATE_FORMAT).to_string(),
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
        }
    }
}

/// 价格查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    /// 年份过滤（可选）
    pub year: Option<String>,
}

/// 通过校验的写入请求
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSubmission {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl PriceSubmission {
    pub fn price(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }

    /// 转换为存储记录，缺失的价格字段记为 0
    pub fn to_record(&self) -> PriceRecord {
        PriceRecord {
            date: self.date,
            symbol: self.symbol.clone(),
            open: self.open.unwrap_or(0.0),
            high: self.high.unwrap_or(0.0),
            low: self.low.unwrap_or(0.0),
            close: self.close.unwrap_or(0.0),
        }
    }
}
