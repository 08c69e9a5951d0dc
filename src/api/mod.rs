pub mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
mod validation;

pub use server::{build_router, run};
