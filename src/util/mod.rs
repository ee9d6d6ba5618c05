//! Utility functions shared by the renderers and the HTTP clients.
//!
//! - **Endpoint validation**: HTTPS enforcement for configured URLs
//! - **Text processing**: terminal-safe, width-aware column fitting and HTML escaping

mod text;
mod url_validator;

pub use text::{display_width, escape_html, fit_to_width, strip_control_chars};
pub use url_validator::{validate_endpoint, UrlValidationError};
