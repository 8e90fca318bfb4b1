// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Deserialize;

use crate::protocol::error::{Result, SudonetError};
use crate::protocol::messages::{Message, MESSAGE_TYPES};

/// Codec for peer messages
///
/// Only JSON is spoken between peers; the enum keeps the door open for
/// another body encoding without touching call sites.
///
/// # Example
///
/// ```
/// use sudonet_common::transport::Codec;
/// use sudonet_common::protocol::{Message, NodeAddress};
///
/// let codec = Codec::new();
/// let msg = Message::join_request(NodeAddress::new("127.0.0.1", 9001));
///
/// let encoded = codec.encode(&msg).unwrap();
/// let decoded = codec.decode(&encoded).unwrap();
/// assert_eq!(msg, decoded);
/// ```
pub enum Codec {
    Json(JsonCodec),
}

impl Codec {
    pub fn new() -> Self {
        Codec::Json(JsonCodec)
    }

    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        match self {
            Codec::Json(_) => JsonCodec::encode(message),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        match self {
            Codec::Json(_) => JsonCodec::decode(data),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal view of a frame body used to classify decode failures.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// JSON codec for peer messages
///
/// Decoding distinguishes three failures:
/// - the body is not a JSON object with a string `type` -> `MalformedMessage`
/// - `type` is not one of the known message types -> `UnknownMessage`
/// - `type` is known but `data` is missing fields -> `MalformedMessage`
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a message to a UTF-8 JSON body (no length prefix).
    pub fn encode(message: &Message) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    /// Decode a UTF-8 JSON body into a message.
    pub fn decode(data: &[u8]) -> Result<Message> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| SudonetError::MalformedMessage(format!("bad envelope: {}", e)))?;

        if !MESSAGE_TYPES.contains(&envelope.kind.as_str()) {
            return Err(SudonetError::UnknownMessage(envelope.kind));
        }

        serde_json::from_slice(data)
            .map_err(|e| SudonetError::MalformedMessage(format!("{}: {}", envelope.kind, e)))
    }

    /// Encode a message as a complete frame: 4-byte big-endian length followed by the body.
    pub fn encode_frame(message: &Message) -> Result<Vec<u8>> {
        let body = Self::encode(message)?;
        let len = u32::try_from(body.len()).map_err(|_| SudonetError::FrameTooLarge {
            len: body.len(),
            max: u32::MAX as usize,
        })?;

        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{NodeAddress, Range, WorkDone};

    #[test]
    fn test_json_codec_round_trip() {
        let msg = Message::WorkDone(WorkDone {
            node: NodeAddress::new("127.0.0.1", 9001),
            range: Range::new(0, 49),
            job_id: Some(3),
        });

        let encoded = JsonCodec::encode(&msg).unwrap();
        let decoded = JsonCodec::decode(&encoded).unwrap();

        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_unknown_type_is_recognised() {
        let body = br#"{"type": "solve_sudoku", "data": {"solutions": []}}"#;
        match JsonCodec::decode(body) {
            Err(SudonetError::UnknownMessage(kind)) => assert_eq!(kind, "solve_sudoku"),
            other => panic!("Expected UnknownMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let body = br#"{"type": "work_done", "data": {"node_ip": "127.0.0.1", "node_port": 1}}"#;
        let err = JsonCodec::decode(body).unwrap_err();
        assert!(matches!(err, SudonetError::MalformedMessage(_)));
        assert!(!err.is_fatal_to_connection());
    }

    #[test]
    fn test_inverted_range_is_malformed() {
        let body = br#"{"type": "work_done", "data": {"node_ip": "127.0.0.1", "node_port": 1, "range": [9, 5]}}"#;
        let err = JsonCodec::decode(body).unwrap_err();
        assert!(matches!(err, SudonetError::MalformedMessage(_)));
        assert!(!err.is_fatal_to_connection());
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = JsonCodec::decode(&[0xFF, 0x00, 0x12]).unwrap_err();
        assert!(matches!(err, SudonetError::MalformedMessage(_)));
    }

    #[test]
    fn test_frame_has_big_endian_prefix() {
        let msg = Message::work_ack(NodeAddress::new("127.0.0.1", 9001));
        let frame = JsonCodec::encode_frame(&msg).unwrap();
        let body = JsonCodec::encode(&msg).unwrap();

        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], body.as_slice());
        assert!(std::str::from_utf8(&frame[4..]).is_ok());
    }

    #[test]
    fn test_codec_enum_json() {
        let msg = Message::join_ack(vec![NodeAddress::new("10.0.0.1", 7000)]);
        let codec = Codec::default();

        let encoded = codec.encode(&msg).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), msg);
    }
}
