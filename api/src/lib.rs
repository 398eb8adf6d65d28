pub mod app_error;
pub mod catalog;
pub mod comparison;
pub mod config;
pub mod deal_handlers;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod metrics_handler;
pub mod observability;
pub mod product_handlers;
pub mod rate_limit;
pub mod request_middleware;
pub mod routes;
pub mod state;
pub mod validation;
