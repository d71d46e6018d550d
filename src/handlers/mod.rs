pub mod health;
pub mod stock;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/nifty")
            .configure(health::config)
            .configure(stock::config)
    );
}
