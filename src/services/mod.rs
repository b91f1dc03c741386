//! Business logic services
//!
//! Each service owns one concern of the station and knows nothing about HTTP.
//! They are composed by [`crate::station::Station`].

pub mod accounts;
pub mod auth;
pub mod dynamic_qr;
pub mod network;
pub mod settings;
pub mod wifi_list;
