//! Cross-origin policy

use crate::config::CorsConfig;
use axum::http::{HeaderValue, Method};
use hatecheck_core::{Error, Result};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Build the CORS layer for the configured allow-list.
///
/// A `*` entry allows every origin. The request origin is echoed back rather
/// than answered with a literal `*` so credentialed requests keep working.
pub fn build_cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let allow_any = config.allowed_origins.iter().any(|o| o.trim() == "*");

    let allow_origin = if allow_any {
        let specific = config.allowed_origins.len() - 1;
        if specific > 0 {
            tracing::warn!(
                "CORS allow-list contains '*' alongside {} specific origin(s); every origin is allowed",
                specific
            );
        }
        AllowOrigin::mirror_request()
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .map_err(|e| Error::config(format!("invalid CORS origin '{}': {}", origin, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.allow_credentials)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_builds() {
        assert!(build_cors_layer(&CorsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_origin_is_config_error() {
        let config = CorsConfig {
            allowed_origins: vec!["https://bad\norigin".to_string()],
            allow_credentials: true,
        };
        assert!(matches!(build_cors_layer(&config), Err(Error::Config(_))));
    }
}
