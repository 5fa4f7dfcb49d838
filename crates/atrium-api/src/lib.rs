pub mod cache;
pub mod error;
pub mod messages;
pub mod notify;
pub mod object_store;
pub mod ports;
pub mod routes;
pub mod service;
pub mod store;

pub use error::ApiError;
pub use service::{AppState, FileUpload, MessageService};
