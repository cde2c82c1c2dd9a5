mod admin;

pub use admin::{admin_auth_middleware, extract_api_key};
