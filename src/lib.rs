pub mod app;
pub mod client;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod output;
pub mod report;
pub mod submit;
pub mod table;
pub mod templates;
