pub mod http_errors;

pub use http_errors::{ensure_success, request_error};
