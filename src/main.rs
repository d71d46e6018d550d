//! Nifty 日线价格服务
//!
//! 提供按股票查询日线价格、以及经过校验后新增价格的 RESTful API
//! 数据来源：本地 CSV 文件

mod config;   // 配置
mod error;    // 错误类型
mod handlers; // HTTP 请求处理器
mod models;   // 数据模型定义
mod services; // 业务逻辑服务

use actix_web::{web, App, HttpServer, middleware::Logger};
use env_logger::Env;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::schema::SchemaValidator;
use crate::services::store::CsvPriceStore;
use crate::services::PriceService;

/// 应用程序入口
///
/// 加载配置和 schema，启动 HTTP 服务器
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // 初始化日志系统，RUST_LOG 优先于配置文件
    env_logger::init_from_env(Env::default().default_filter_or(config.log.level.as_str()));

    match &config.source {
        Some(path) => log::info!("从 {} 加载配置成功", path),
        None => log::info!("使用默认配置"),
    }

    // schema 只在启动时加载一次
    let schema = SchemaValidator::from_file(&config.data.schema_path)?;
    let store = CsvPriceStore::new(&config.data.csv_path);
    if !store.path().exists() {
        log::warn!("数据文件 {} 不存在，读写请求将返回错误", store.path().display());
    }

    let service = web::Data::new(PriceService::new(Arc::new(store), schema));

    log::info!("启动 Nifty 价格服务，监听 {}", config.bind_addr());

    // 创建并启动 HTTP 服务器
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default()) // 添加请求日志中间件
            .app_data(service.clone())
            .configure(handlers::config) // 配置路由
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(config.bind_addr())?.run().await?;
    Ok(())
}
