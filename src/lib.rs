pub mod api;
pub mod callback;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod fetcher;
pub mod humanize;
pub mod observability;
pub mod queue;
pub mod store;
pub mod worker;
