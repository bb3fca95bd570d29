//! HLS streaming session requests.

use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};

/// Port the device serves HLS playlists on.
pub const HLS_PORT: u16 = 49152;

/// What to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsSource {
    /// An existing recording, by `recordingId`.
    Recording(String),
    /// A live TV channel, by `stbChannelId`.
    Channel(String),
}

impl HlsSource {
    /// Pick the source from the command-line ids. A channel wins when both
    /// are given.
    pub fn from_ids(recording_id: Option<String>, channel_id: Option<String>) -> Option<Self> {
        channel_id
            .map(Self::Channel)
            .or_else(|| recording_id.map(Self::Recording))
    }
}

/// Monitoring request that opens a streaming session for `source`.
pub fn session_request(source: &HlsSource) -> Value {
    let mut request = json!({
        "clientUuid": "1234",
        "deviceConfiguration": {
            "type": "deviceConfiguration",
            "deviceType": "webPlayer",
        },
        "supportedEncryption": {
            "type": "hlsStreamEncryptionInfo",
            "encryptionType": "hlsAes128Cbc",
        },
        "sessionType": "streaming",
        "isLocal": true,
    });
    let (request_type, id_key, id) = match source {
        HlsSource::Recording(id) => ("hlsStreamRecordingRequest", "recordingId", id),
        HlsSource::Channel(id) => ("hlsStreamLiveTvRequest", "stbChannelId", id),
    };
    request["type"] = json!(request_type);
    request[id_key] = json!(id);
    request
}

/// Playlist URI from the final session response, or the device's error code.
pub fn playlist_uri(response: &Value) -> Result<&str> {
    let Some(session) = response.get("hlsSession") else {
        let code = response
            .get("errorCode")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        bail!("streaming session refused: {code}");
    };
    session
        .get("playlistUri")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("streaming session carries no playlistUri"))
}

/// Full playlist URL on `host`.
pub fn playlist_url(host: &str, uri: &str) -> String {
    format!("http://{host}:{HLS_PORT}{uri}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_request_shape() {
        let request = session_request(&HlsSource::Recording("tivo:rc.42".into()));
        assert_eq!(request["type"], "hlsStreamRecordingRequest");
        assert_eq!(request["recordingId"], "tivo:rc.42");
        assert!(request.get("stbChannelId").is_none());
        assert_eq!(request["sessionType"], "streaming");
        assert_eq!(request["isLocal"], true);
        assert_eq!(request["deviceConfiguration"]["deviceType"], "webPlayer");
        assert_eq!(request["supportedEncryption"]["encryptionType"], "hlsAes128Cbc");
    }

    #[test]
    fn live_tv_request_shape() {
        let request = session_request(&HlsSource::Channel("tivo:ch.7".into()));
        assert_eq!(request["type"], "hlsStreamLiveTvRequest");
        assert_eq!(request["stbChannelId"], "tivo:ch.7");
        assert!(request.get("recordingId").is_none());
    }

    #[test]
    fn channel_wins_over_recording() {
        assert_eq!(
            HlsSource::from_ids(Some("r".into()), Some("c".into())),
            Some(HlsSource::Channel("c".into()))
        );
        assert_eq!(
            HlsSource::from_ids(Some("r".into()), None),
            Some(HlsSource::Recording("r".into()))
        );
        assert_eq!(HlsSource::from_ids(None, None), None);
    }

    #[test]
    fn final_response_yields_playlist() {
        let response = json!({
            "type": "hlsStreamResponse",
            "hlsSession": {"playlistUri": "/hls/abc/index.m3u8"},
        });
        let uri = playlist_uri(&response).unwrap();
        assert_eq!(uri, "/hls/abc/index.m3u8");
        assert_eq!(
            playlist_url("dvr.lan", uri),
            "http://dvr.lan:49152/hls/abc/index.m3u8"
        );
    }

    #[test]
    fn error_response_reports_code() {
        let response = json!({"type": "error", "errorCode": "tooManyStreams"});
        let err = playlist_uri(&response).unwrap_err();
        assert_eq!(err.to_string(), "streaming session refused: tooManyStreams");

        let err = playlist_uri(&Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "streaming session refused: unknown");
    }

    #[test]
    fn session_without_uri_is_error() {
        let response = json!({"hlsSession": {}});
        assert!(playlist_uri(&response).is_err());
    }
}
