//! 股票价格接口处理器
//!
//! ## API 列表
//! - GET /nifty/stocks/{symbol}?year=YYYY - 获取日线价格（日期降序）
//! - POST /nifty/stocks/ - 新增一条日线价格

use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};

use crate::error::NiftyError;
use crate::models::PriceQuery;
use crate::services::PriceService;

/// 获取股票日线价格
///
/// GET /nifty/stocks/{symbol}
///
/// # 参数
/// - symbol: 股票代码（大小写敏感）
/// - year: 年份过滤（可选）
pub async fn get_price_data(
    path: web::Path<String>,
    query: web::Query<PriceQuery>,
    service: web::Data<PriceService>,
) -> Result<HttpResponse> {
    let symbol = path.into_inner();

    match service.get_prices(&symbol, query.year.as_deref()).await {
        Ok(rows) => Ok(HttpResponse::Ok().json(rows)),
        Err(e) => {
            log::debug!("查询 {} 失败: {}", symbol, e);
            Ok(e.error_response())
        }
    }
}

/// 新增日线价格
///
/// POST /nifty/stocks/
///
/// 请求体示例：
/// `{"symbol": "INFY", "date": "15/01/2020", "open": 1, "high": 1, "low": 1, "close": 1}`
pub async fn create_price(
    body: web::Bytes,
    service: web::Data<PriceService>,
) -> Result<HttpResponse> {
    match service.create_price(&body).await {
        Ok(document) => Ok(HttpResponse::Created().json(document)),
        Err(e) => Ok(e.error_response()),
    }
}

/// GET /nifty/stocks/ 未提供股票代码
pub async fn missing_symbol() -> Result<HttpResponse> {
    Ok(NiftyError::MissingParameter.error_response())
}

// 查询参数无法解析时同样返回 {"error": ...}
fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req: &HttpRequest| {
        log::debug!("查询参数解析失败: {}", err);
        NiftyError::InvalidYear(req.query_string().to_string()).into()
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stocks")
            .app_data(query_config())
            .route("", web::post().to(create_price))
            .route("", web::get().to(missing_symbol))
            .route("/", web::post().to(create_price))
            .route("/", web::get().to(missing_symbol))
            .route("/{symbol}", web::get().to(get_price_data))
    );
}
