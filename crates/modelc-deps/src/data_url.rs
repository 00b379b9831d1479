//! `data:` url decoding for embedded definition payloads.
//!
//! Supports `data:[<mediatype>][;charset=<cs>][;base64],<payload>` with
//! percent-encoded or base64 bodies.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use percent_encoding::percent_decode_str;

use crate::error::DependencyErrorKind;

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A decoded `data:` url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub charset: Option<String>,
    pub body: Vec<u8>,
}

/// Whether `input` looks like a `data:` url (scheme match is case-insensitive).
pub fn is_data_url(input: &str) -> bool {
    input
        .get(..5)
        .map(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

impl DataUrl {
    pub fn parse(input: &str) -> Result<Self, DependencyErrorKind> {
        let input = input.trim();
        if !is_data_url(input) {
            return Err(DependencyErrorKind::InvalidDataUrl(
                "missing data: scheme".to_string(),
            ));
        }
        let rest = &input[5..];
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            DependencyErrorKind::InvalidDataUrl("missing ',' before payload".to_string())
        })?;

        let mut params = header.split(';').map(str::trim);
        let mime_type = match params.next() {
            Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
            _ => "text/plain".to_string(),
        };

        let mut charset = None;
        let mut is_base64 = false;
        for param in params {
            if param.eq_ignore_ascii_case("base64") {
                is_base64 = true;
            } else if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("charset") {
                    charset = Some(value.trim().trim_matches('"').to_ascii_lowercase());
                }
            }
        }

        let raw: Vec<u8> = percent_decode_str(payload).collect();
        let body = if is_base64 {
            let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
            BASE64
                .decode(compact)
                .map_err(|e| DependencyErrorKind::InvalidDataUrl(format!("bad base64 payload: {e}")))?
        } else {
            raw
        };

        Ok(DataUrl {
            mime_type,
            charset,
            body,
        })
    }

    /// Decode the body as text using the declared charset (UTF-8 when absent).
    pub fn decode_text(&self) -> Result<String, DependencyErrorKind> {
        match self.charset.as_deref().unwrap_or("utf-8") {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8(self.body.clone())
                .map_err(|_| DependencyErrorKind::InvalidDataUrl("payload is not valid UTF-8".to_string())),
            "iso-8859-1" | "latin1" | "l1" => Ok(self.body.iter().map(|&b| b as char).collect()),
            other => Err(DependencyErrorKind::UnsupportedEncoding(other.to_string())),
        }
    }
}
