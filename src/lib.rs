pub mod api;
pub mod config;
pub mod display_client;
pub mod error;
pub mod http_client;
pub mod messaging;
pub mod radio;
pub mod render;
pub mod services;
pub mod station;
pub mod store;
