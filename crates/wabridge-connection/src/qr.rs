//! Pairing-challenge rendering.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use qrcode::{QrCode, render::svg};
use thiserror::Error;

/// QR render error.
#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encode failed: {0}")]
    Encode(String),
}

/// Render a challenge payload into a scannable `data:` URL image.
///
/// SVG output keeps the render free of any raster image stack.
///
/// # Errors
/// Returns error if the payload exceeds QR capacity.
pub fn data_url(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", BASE64.encode(image)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_data_url() {
        let url = data_url("2@abcdef==,ghijkl==,mnopqr==").unwrap();
        let encoded = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
