use percent_encoding::percent_decode_str;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::MigrateError;

/// Body of a fetched URL plus the file name the server suggested, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Download, MigrateError>;
}

/// Blocking HTTP fetcher. One attempt per URL, transport default timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, MigrateError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nmrshift-migrate/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MigrateError::Network(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| MigrateError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(response: Response) -> Result<Response, MigrateError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(MigrateError::HttpStatus { status, message })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Download, MigrateError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| MigrateError::Network(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_file_name);
        let bytes = response
            .bytes()
            .map_err(|err| MigrateError::Network(err.to_string()))?;
        Ok(Download {
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}

/// Extracts the file name from a `Content-Disposition` header value. The
/// RFC 5987 `filename*=` form wins over plain `filename=`.
pub fn disposition_file_name(header: &str) -> Option<String> {
    let params: Vec<&str> = header.split(';').map(str::trim).collect();
    let extended = params
        .iter()
        .find_map(|part| part.strip_prefix("filename*="))
        .and_then(extended_value);
    extended
        .or_else(|| {
            params
                .iter()
                .find_map(|part| part.strip_prefix("filename="))
                .map(|name| name.trim_matches('"').to_string())
        })
        .filter(|name| !name.is_empty())
}

// charset'language'percent-encoded
fn extended_value(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    let bytes: Vec<u8> = percent_decode_str(encoded).collect();
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()
    } else {
        // ISO-8859-1 maps byte for byte onto the first Unicode block.
        Some(bytes.into_iter().map(char::from).collect())
    }
}
