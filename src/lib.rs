pub mod api;
pub mod availability;
pub mod config;
pub mod error;
pub mod forms;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;
