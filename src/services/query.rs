//! 价格查询：过滤、排序、序列化

use chrono::{Datelike, NaiveDate};

use crate::error::{NiftyError, Result};
use crate::models::{PriceRecord, PriceRow};

/// 解析年份参数
///
/// 必须是整数，且能与 1 月 1 日组成合法日期；空字符串视为未提供
pub fn parse_year(raw: Option<&str>) -> Result<Option<i32>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    raw.parse::<i32>()
        .ok()
        .filter(|year| (1..=9999).contains(year))
        .filter(|year| NaiveDate::from_ymd_opt(*year, 1, 1).is_some())
        .map(Some)
        .ok_or_else(|| NiftyError::InvalidYear(raw.to_string()))
}

/// 查询某只股票的价格，按日期降序
///
/// 股票不存在时返回 None，与“存在但过滤后为空”区分
pub fn query(history: &[PriceRecord], symbol: &str, year: Option<i32>) -> Option<Vec<PriceRow>> {
    let mut rows: Vec<&PriceRecord> = history.iter().filter(|r| r.symbol == symbol).collect();
    if rows.is_empty() {
        return None;
    }

    if let Some(year) = year {
        rows.retain(|r| r.date.year() == year);
    }

    rows.sort_by(|a, b| b.date.cmp(&a.date));
    Some(rows.into_iter().map(PriceRow::from).collect())
}
