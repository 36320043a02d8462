//! Binary format of published export files.
//!
//! A file is the 16 byte [`EXPORT_FILE_HEADER`] followed by a protobuf
//! encoded [`TemporaryExposureKeyExport`]. Encoding is byte-stable for a
//! fixed, ordered input, which is what lets a worker rewrite a file after a
//! crash without changing its contents.

use prost::Message;
use thiserror::Error;

use crate::{Exposure, ExportWindow};

/// Fixed-width format tag written before the protobuf payload.
pub const EXPORT_FILE_HEADER: &[u8; 16] = b"EK Export v1    ";

#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKeyExport {
    /// Window start, seconds since the epoch (inclusive).
    #[prost(fixed64, tag = "1")]
    pub start_timestamp: u64,
    /// Window end, seconds since the epoch (exclusive).
    #[prost(fixed64, tag = "2")]
    pub end_timestamp: u64,
    #[prost(string, tag = "3")]
    pub region: String,
    /// 1-based position of this file among its siblings.
    #[prost(int32, tag = "4")]
    pub batch_num: i32,
    /// Number of sibling files for the same window and region.
    #[prost(int32, tag = "5")]
    pub batch_size: i32,
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key_data: Vec<u8>,
    #[prost(int32, tag = "2")]
    pub transmission_risk_level: i32,
    #[prost(int32, tag = "3")]
    pub rolling_start_interval_number: i32,
    #[prost(int32, tag = "4")]
    pub rolling_period: i32,
}

impl From<&Exposure> for TemporaryExposureKey {
    fn from(exposure: &Exposure) -> Self {
        Self {
            key_data: exposure.exposure_key.clone(),
            transmission_risk_level: exposure.transmission_risk,
            rolling_start_interval_number: exposure.interval_number,
            rolling_period: exposure.interval_count,
        }
    }
}

impl TemporaryExposureKeyExport {
    /// Builds an export from exposures already in publication order.
    pub fn from_exposures(
        window: ExportWindow,
        region: &str,
        batch_num: i32,
        batch_size: i32,
        exposures: &[Exposure],
    ) -> Self {
        Self {
            start_timestamp: window.start.timestamp().max(0) as u64,
            end_timestamp: window.end.timestamp().max(0) as u64,
            region: region.to_string(),
            batch_num,
            batch_size,
            keys: exposures.iter().map(TemporaryExposureKey::from).collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportFileError {
    #[error("Export file is missing the expected header")]
    InvalidHeader,

    #[error("Failed to decode export payload: {0}")]
    Decode(#[from] prost::DecodeError),
}

pub fn encode_export_file(export: &TemporaryExposureKeyExport) -> Vec<u8> {
    let mut buf = Vec::with_capacity(EXPORT_FILE_HEADER.len() + export.encoded_len());
    buf.extend_from_slice(EXPORT_FILE_HEADER);
    buf.extend_from_slice(&export.encode_to_vec());
    buf
}

pub fn decode_export_file(data: &[u8]) -> Result<TemporaryExposureKeyExport, ExportFileError> {
    let payload = data
        .strip_prefix(EXPORT_FILE_HEADER.as_slice())
        .ok_or(ExportFileError::InvalidHeader)?;
    Ok(TemporaryExposureKeyExport::decode(payload)?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn exposure(key: u8, risk: i32) -> Exposure {
        Exposure {
            exposure_key: vec![key; 16],
            transmission_risk: risk,
            app_package_name: "com.example.pkg".to_string(),
            region: "US".to_string(),
            interval_number: 2_650_000,
            interval_count: 144,
            created_at: Utc.timestamp_opt(1_590_000_000, 0).unwrap(),
            local_provenance: true,
            sync_id: None,
        }
    }

    fn window() -> ExportWindow {
        ExportWindow::new(
            Utc.timestamp_opt(1_589_997_600, 0).unwrap(),
            Utc.timestamp_opt(1_590_001_200, 0).unwrap(),
        )
    }

    #[test]
    fn test_export_file_starts_with_header() {
        let export =
            TemporaryExposureKeyExport::from_exposures(window(), "US", 1, 1, &[exposure(1, 4)]);
        let bytes = encode_export_file(&export);
        assert_eq!(&bytes[..16], EXPORT_FILE_HEADER);
    }

    #[test]
    fn test_export_file_decodes_to_same_content() {
        let exposures = vec![exposure(1, 4), exposure(2, 6)];
        let export = TemporaryExposureKeyExport::from_exposures(window(), "US", 2, 3, &exposures);

        let decoded = decode_export_file(&encode_export_file(&export)).unwrap();

        assert_eq!(decoded, export);
        assert_eq!(decoded.start_timestamp, 1_589_997_600);
        assert_eq!(decoded.end_timestamp, 1_590_001_200);
        assert_eq!(decoded.batch_num, 2);
        assert_eq!(decoded.batch_size, 3);
        assert_eq!(decoded.keys.len(), 2);
        assert_eq!(decoded.keys[1].key_data, vec![2; 16]);
        assert_eq!(decoded.keys[1].transmission_risk_level, 6);
        assert_eq!(decoded.keys[1].rolling_period, 144);
    }

    #[test]
    fn test_export_file_encoding_is_byte_stable() {
        let exposures = vec![exposure(3, 1), exposure(7, 2), exposure(9, 3)];
        let first = encode_export_file(&TemporaryExposureKeyExport::from_exposures(
            window(),
            "CA",
            1,
            1,
            &exposures,
        ));
        let second = encode_export_file(&TemporaryExposureKeyExport::from_exposures(
            window(),
            "CA",
            1,
            1,
            &exposures,
        ));
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_rejects_missing_header() {
        assert!(matches!(
            decode_export_file(b"not an export file"),
            Err(ExportFileError::InvalidHeader)
        ));
    }
}
