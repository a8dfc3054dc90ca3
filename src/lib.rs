pub mod analytics;
pub mod auth;
pub mod certs;
pub mod error;
pub mod export;
pub mod manager;
pub mod model;
pub mod policy;
pub mod security;
pub mod server;
pub mod store;
pub mod token;
pub mod upload;
pub mod users;
