//! 错误类型定义
//!
//! 每种错误对应一个处理阶段，并映射到各自的 HTTP 状态码

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// 单个价格字段的离群违规
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierViolation {
    /// 字段名（close / open / high / low）
    pub field: &'static str,
    /// 提交的价格
    pub value: f64,
    /// 回看窗口均值
    pub mean: f64,
    /// 回看窗口样本标准差
    pub std: f64,
}

#[derive(Debug, Error)]
pub enum NiftyError {
    #[error("No symbol provided")]
    MissingParameter,

    #[error("Provided year {0} is invalid")]
    InvalidYear(String),

    #[error("No price data found for symbol {0}")]
    SymbolNotFound(String),

    #[error("Validation error: {0}")]
    SchemaViolation(String),

    #[error("Validation error: date must be in DD/MM/YYYY format")]
    InvalidDateFormat,

    #[error("Entry already exists for {symbol} and {date}")]
    DuplicateRecord { symbol: String, date: chrono::NaiveDate },

    #[error("{}", describe_outliers(.0))]
    OutlierRejected(Vec<OutlierViolation>),

    #[error("Error reading from data file: {0}")]
    StorageReadFailure(String),

    #[error("Error writing to data file: {0}")]
    StorageWriteFailure(String),

    #[error("Validation error: No json payload found")]
    MalformedRequestBody,
}

fn describe_outliers(violations: &[OutlierViolation]) -> String {
    violations
        .iter()
        .map(|v| {
            format!(
                "Value {} for {} is outside one standard deviation of the previous {} values \
                 (mean {:.4}, std {:.4})",
                v.value,
                v.field,
                crate::services::validation::LOOKBACK_DAYS,
                v.mean,
                v.std
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResponseError for NiftyError {
    fn status_code(&self) -> StatusCode {
        match self {
            NiftyError::SymbolNotFound(_) => StatusCode::NOT_FOUND,
            NiftyError::DuplicateRecord { .. } => StatusCode::CONFLICT,
            NiftyError::StorageReadFailure(_) | NiftyError::StorageWriteFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, NiftyError>;
