//! Server configuration

use osckit_core::{EncodingErrors, TextCodec, TextEncoding, UDP_MAX_SIZE};
use serde::{Deserialize, Serialize};

/// Server configuration
///
/// Deserialises from partial documents; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Discard bundles whose timetag is already in the past
    pub drop_late_bundles: bool,
    /// Treat bound addresses as patterns instead of literal keys
    pub advanced_matching: bool,
    /// Decode `s` arguments to text with this encoding
    pub encoding: Option<TextEncoding>,
    pub encoding_errors: EncodingErrors,
    /// Log callback errors and keep running instead of stopping the server
    pub intercept_errors: bool,
    /// Receive buffer size per socket
    pub max_packet_size: usize,
    /// Datagrams queued between socket readers and the dispatcher
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            drop_late_bundles: false,
            advanced_matching: false,
            encoding: None,
            encoding_errors: EncodingErrors::Strict,
            intercept_errors: true,
            max_packet_size: UDP_MAX_SIZE,
            channel_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// The text codec implied by `encoding` and `encoding_errors`
    pub fn text_codec(&self) -> Option<TextCodec> {
        self.encoding
            .map(|encoding| TextCodec::new(encoding, self.encoding_errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(!config.drop_late_bundles);
        assert!(!config.advanced_matching);
        assert!(config.intercept_errors);
        assert_eq!(config.max_packet_size, 65535);
        assert!(config.text_codec().is_none());
    }

    #[test]
    fn test_partial_json() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"advanced_matching": true, "encoding": "utf-8"}"#).unwrap();
        assert!(config.advanced_matching);
        assert!(config.intercept_errors);
        assert_eq!(
            config.text_codec(),
            Some(TextCodec::new(TextEncoding::Utf8, EncodingErrors::Strict))
        );
    }
}
