//! REST adapter for the dispatch gateway port.

mod dto;
mod http_gateway;

pub use http_gateway::{RestDispatchGateway, RestGatewayConfig};
