use crate::model::s3::{GatewayError, HttpRange};

const BYTES_UNIT: &str = "bytes=";

/// Parses a single-range `Range` header value such as `bytes=0-99`,
/// `bytes=100-` or `bytes=-500`.
pub fn parse_range(header: &str) -> Result<HttpRange, GatewayError> {
    let invalid = || GatewayError::InvalidRange(header.to_string());

    let ranges = header.trim().strip_prefix(BYTES_UNIT).ok_or_else(invalid)?;
    if ranges.contains(',') {
        return Err(invalid());
    }

    let (start, end) = ranges.split_once('-').ok_or_else(invalid)?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        let len = end.parse::<u64>().map_err(|_| invalid())?;
        return Ok(HttpRange::Suffix(len));
    }

    let start = start.parse::<u64>().map_err(|_| invalid())?;
    let end = if end.is_empty() {
        None
    } else {
        let end = end.parse::<u64>().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        Some(end)
    };

    Ok(HttpRange::FromTo { start, end })
}
