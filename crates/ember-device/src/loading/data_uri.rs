// Copyright 2025 eraflo
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

//! `data:` URI decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Returns `true` if `url` is an inline `data:` URI.
pub fn is_data_uri(url: &str) -> bool {
    url.len() >= 5 && url[..5].eq_ignore_ascii_case("data:")
}

/// The media type declared by a data URI, if any.
pub fn media_type(url: &str) -> Option<&str> {
    let header = url.get(5..)?.split_once(',')?.0;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}

/// Decodes the payload of a data URI.
///
/// Base64 payloads are decoded; other payloads are returned as their raw
/// bytes.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>, String> {
    if !is_data_uri(url) {
        return Err("not a data URI".to_string());
    }
    let (header, payload) = url[5..]
        .split_once(',')
        .ok_or_else(|| "data URI has no payload separator".to_string())?;
    if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 payload: {e}"))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_data_uris() {
        assert!(is_data_uri("data:image/png;base64,AAAA"));
        assert!(is_data_uri("DATA:,x"));
        assert!(!is_data_uri("textures/data.png"));
        assert!(!is_data_uri("dat"));
    }

    #[test]
    fn decodes_base64_payloads() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AQID").unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(media_type("data:image/png;base64,AQID"), Some("image/png"));
        assert_eq!(media_type("data:;base64,AQID"), None);
    }

    #[test]
    fn plain_payloads_pass_through() {
        assert_eq!(decode_data_uri("data:text/plain,hi").unwrap(), b"hi".to_vec());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode_data_uri("data:image/png;base64").is_err());
        assert!(decode_data_uri("data:;base64,@@@").is_err());
    }
}
