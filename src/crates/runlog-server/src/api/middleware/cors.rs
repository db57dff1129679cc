//! CORS middleware configuration
//!
//! The frontend may be served from any origin, so every response carries
//! `Access-Control-Allow-Origin: *` and preflight requests are answered
//! here.

use tower_http::cors::CorsLayer;

pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
