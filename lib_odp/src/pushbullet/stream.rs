//! # Pushbullet Realtime Stream
//!
//! Opens the account's websocket and exposes it as a stream of decoded
//! [`StreamMessage`]s. The stream carries no push content: a `tickle` with
//! subtype `push` only says the push list changed and must be re-fetched.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::error::ProviderError;
use super::models::StreamMessage;

/// Production stream endpoint; the access token is appended as the last path segment.
pub const STREAM_BASE_URL: &str = "wss://stream.pushbullet.com/websocket/";

/// Decoded stream frames. Ends after a close frame or a transport error.
pub type EventStream = BoxStream<'static, Result<StreamMessage, ProviderError>>;

pub fn stream_url(api_key: &str) -> String {
    format!("{}{}", STREAM_BASE_URL, api_key)
}

/// Connects to the realtime stream for `api_key`.
pub async fn subscribe(api_key: &str) -> Result<EventStream, ProviderError> {
    subscribe_url(&stream_url(api_key)).await
}

/// Connects to an explicit websocket URL.
pub async fn subscribe_url(url: &str) -> Result<EventStream, ProviderError> {
    let (ws_stream, _) = connect_async(url).await?;
    log::info!("Connected to Pushbullet stream.");

    let events = ws_stream
        .filter_map(|frame| async move { decode_frame(frame) })
        .boxed();
    Ok(events)
}

/// Maps one websocket frame to a stream item; control frames yield nothing.
pub fn decode_frame(
    frame: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<StreamMessage, ProviderError>> {
    match frame {
        Ok(Message::Text(text)) => {
            log::trace!("Stream frame: {}", text.as_str());
            Some(serde_json::from_str::<StreamMessage>(text.as_str()).map_err(ProviderError::from))
        }
        Ok(Message::Close(frame)) => {
            log::warn!("Stream closed by remote host: {:?}", frame);
            Some(Err(ProviderError::StreamClosed))
        }
        Ok(Message::Binary(bin)) => {
            log::debug!("Ignoring {} byte binary stream frame", bin.len());
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(ProviderError::from(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_appends_token() {
        assert_eq!(
            stream_url("o.abc"),
            "wss://stream.pushbullet.com/websocket/o.abc"
        );
    }

    #[test]
    fn test_decode_text_frames() {
        let tickle = decode_frame(Ok(Message::text(r#"{"type":"tickle","subtype":"push"}"#)));
        assert!(matches!(tickle, Some(Ok(ref m)) if m.is_push_tickle()));

        let garbage = decode_frame(Ok(Message::text("not json")));
        assert!(matches!(garbage, Some(Err(ProviderError::StreamDecode(_)))));
    }

    #[test]
    fn test_control_frames_are_skipped_and_close_ends() {
        assert!(decode_frame(Ok(Message::Ping(Default::default()))).is_none());
        assert!(matches!(
            decode_frame(Ok(Message::Close(None))),
            Some(Err(ProviderError::StreamClosed))
        ));
    }
}
