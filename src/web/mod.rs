pub mod admin;
pub mod auth;
pub mod courses;
pub mod error;
pub mod pagination;
pub mod professors;
pub mod query;
pub mod reports;
pub mod reviews;

use actix_web::web::{JsonConfig, PathConfig, QueryConfig};
use error::ApiError;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Extractor failures render like every other API error.
    conf.app_data(JsonConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(QueryConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid query string: {}", err)).into()
    }))
    .app_data(PathConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid path: {}", err)).into()
    }));

    auth::configure(conf);
    courses::configure(conf);
    professors::configure(conf);
    reviews::configure(conf);
    reports::configure(conf);
    admin::configure(conf);
}
