//! 业务逻辑服务模块
//!
//! 封装数据存储、校验和查询逻辑

pub mod price_service; // 价格读写流程
pub mod query;         // 查询过滤与序列化
pub mod schema;        // 请求结构校验
pub mod store;         // 数据文件存储
pub mod validation;    // 重复与离群检查

pub use price_service::PriceService;
