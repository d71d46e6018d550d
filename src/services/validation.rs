//! 数据校验：重复检查与离群检查
//!
//! 离群检查取同一股票在候选日期之前最近的 50 条记录，
//! 每个价格字段的值必须落在 [均值 - 标准差, 均值 + 标准差] 区间内。

use chrono::NaiveDate;

use crate::error::{NiftyError, OutlierViolation, Result};
use crate::models::{PriceField, PriceRecord, PriceSubmission};

/// 回看窗口大小
pub const LOOKBACK_DAYS: usize = 50;

/// 检查 (symbol, date) 是否已存在
pub fn check_duplicate(history: &[PriceRecord], symbol: &str, date: NaiveDate) -> bool {
    history
        .iter()
        .filter(|r| r.symbol == symbol)
        .any(|r| r.date == date)
}

/// 候选日期之前最近的 LOOKBACK_DAYS 条记录（日期降序）
pub fn lookback_window<'a>(
    history: &'a [PriceRecord],
    symbol: &str,
    date: NaiveDate,
) -> Vec<&'a PriceRecord> {
    let mut prior: Vec<&PriceRecord> = history
        .iter()
        .filter(|r| r.symbol == symbol && r.date < date)
        .collect();
    prior.sort_by(|a, b| b.date.cmp(&a.date));
    prior.truncate(LOOKBACK_DAYS);
    prior
}

/// 窗口内某个字段的统计量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub mean: f64,
    pub std: f64,
}

impl Envelope {
    /// 样本均值与样本标准差（n - 1）
    ///
    /// 少于两条记录时标准差无定义，返回 None
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(Self {
            mean,
            std: variance.sqrt(),
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        !(value < self.mean - self.std || value > self.mean + self.std)
    }
}

/// 离群检查，报告全部违规字段（按 close, open, high, low 顺序）
pub fn check_outlier(history: &[PriceRecord], submission: &PriceSubmission) -> Result<()> {
    let window = lookback_window(history, &submission.symbol, submission.date);
    if window.is_empty() {
        return Ok(());
    }

    let mut violations = Vec::new();
    for field in PriceField::CHECK_ORDER {
        let value = match submission.price(field) {
            Some(value) => value,
            None => continue,
        };

        let values: Vec<f64> = window.iter().map(|r| r.price(field)).collect();
        let envelope = match Envelope::from_values(&values) {
            Some(envelope) => envelope,
            None => continue,
        };

        log::debug!(
            "{} {} 窗口 {} 条: mean={:.4} std={:.4} value={}",
            submission.symbol,
            field.name(),
            window.len(),
            envelope.mean,
            envelope.std,
            value
        );

        if !envelope.contains(value) {
            violations.push(OutlierViolation {
                field: field.name(),
                value,
                mean: envelope.mean,
                std: envelope.std,
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(NiftyError::OutlierRejected(violations))
    }
}
