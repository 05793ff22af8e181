//! Protobuf decoder for GTFS Realtime feeds.

use anyhow::Result;
use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// Stateless; the envelope is either decoded whole or rejected. Prost never
/// hands back a partially populated message on malformed input.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        // An empty byte array decodes to a FeedMessage with default values.
        // This is valid protobuf behavior: no header, no entities.
        let result = parse_feed(&[]);
        assert!(result.is_ok());
        let feed = result.unwrap();
        assert!(feed.header.is_none());
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        // Random invalid bytes should fail
        let invalid_bytes = vec![0xFF, 0xFE, 0x00, 0x01];
        let result = parse_feed(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_valid_minimal_feed() {
        use crate::gtfs_rt::{FeedHeader, FeedMessage};

        let feed = FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1234567890),
                incrementality: None,
                feed_version: None,
            }),
            entity: vec![],
        };
        let encoded = feed.encode_to_vec();
        let result = parse_feed(&encoded);

        assert!(result.is_ok());
        let parsed = result.unwrap();
        let header = parsed.header.expect("header survives the round trip");
        assert_eq!(header.gtfs_realtime_version, "2.0");
        assert_eq!(header.timestamp, Some(1234567890));
    }
}
