//! Inbound control messages from the page.
//!
//! Messages are JSON objects tagged by `type`, with camelCase fields:
//!
//! ```text
//! {"type": "CACHE_GAME_RESOURCE", "url": "...", "responseData": ..., "contentType": "..."}
//!   -> {"success": true, "url": "..."}
//! {"type": "CACHE_GAME", "gameUrl": "...", "gameId": 7, "slug": "..."}
//!   -> {"success": true, "gameId": 7, "slug": "...", "size": 1234}
//! ```

use super::OfflineWorker;
use crate::error::{GameCacheError, Result};
use crate::models::{cache_key, FetchRequest, FetchResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const CACHE_GAME_RESOURCE: &str = "CACHE_GAME_RESOURCE";
const CACHE_GAME: &str = "CACHE_GAME";

/// A control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    /// Store caller-supplied bytes under `url` in the game-resources namespace.
    #[serde(rename = "CACHE_GAME_RESOURCE", rename_all = "camelCase")]
    CacheGameResource {
        url: String,
        response_data: ResponseData,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// Fetch `game_url` and store it in the game-resources namespace.
    #[serde(rename = "CACHE_GAME", rename_all = "camelCase")]
    CacheGame {
        game_url: String,
        #[serde(default)]
        game_id: Value,
        slug: String,
    },
}

impl WorkerMessage {
    /// Parse a raw message.
    ///
    /// Returns `Ok(None)` when the `type` is missing or unknown; such messages
    /// are meant for someone else. A known type with a bad payload is an error.
    pub fn parse(raw: &Value) -> Result<Option<Self>> {
        match raw.get("type").and_then(Value::as_str) {
            Some(CACHE_GAME_RESOURCE) | Some(CACHE_GAME) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| GameCacheError::InvalidMessage {
                    message: e.to_string(),
                }),
            _ => Ok(None),
        }
    }
}

/// Response body supplied with `CACHE_GAME_RESOURCE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Bytes(Vec<u8>),
    Text(String),
}

impl ResponseData {
    pub fn into_bytes(self) -> Bytes {
        match self {
            ResponseData::Bytes(bytes) => Bytes::from(bytes),
            ResponseData::Text(text) => Bytes::from(text),
        }
    }
}

/// Reply to `CACHE_GAME_RESOURCE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReply {
    pub success: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to `CACHE_GAME`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReply {
    pub success: bool,
    pub game_id: Value,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply sent back over the message port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageReply {
    Game(GameReply),
    Resource(ResourceReply),
}

impl MessageReply {
    pub fn success(&self) -> bool {
        match self {
            MessageReply::Game(reply) => reply.success,
            MessageReply::Resource(reply) => reply.success,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MessageReply::Game(reply) => reply.error.as_deref(),
            MessageReply::Resource(reply) => reply.error.as_deref(),
        }
    }

    /// Failure reply for a known message type whose payload didn't parse.
    fn invalid(raw: &Value, err: &GameCacheError) -> Self {
        let text = |field: &str| {
            raw.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match raw.get("type").and_then(Value::as_str) {
            Some(CACHE_GAME) => MessageReply::Game(GameReply {
                success: false,
                game_id: raw.get("gameId").cloned().unwrap_or(Value::Null),
                slug: text("slug"),
                size: None,
                error: Some(err.to_string()),
            }),
            _ => MessageReply::Resource(ResourceReply {
                success: false,
                url: text("url"),
                error: Some(err.to_string()),
            }),
        }
    }
}

impl OfflineWorker {
    /// Handle a parsed control message and build its reply.
    pub async fn handle_message(&self, message: WorkerMessage) -> MessageReply {
        match message {
            WorkerMessage::CacheGameResource {
                url,
                response_data,
                content_type,
            } => {
                let result = self.cache_resource(&url, response_data, content_type.as_deref());
                if let Err(e) = &result {
                    warn!("Failed to cache resource {}: {}", url, e);
                }
                MessageReply::Resource(ResourceReply {
                    success: result.is_ok(),
                    url,
                    error: result.err().map(|e| e.to_string()),
                })
            }
            WorkerMessage::CacheGame {
                game_url,
                game_id,
                slug,
            } => match self.cache_game(&game_url).await {
                Ok(size) => MessageReply::Game(GameReply {
                    success: true,
                    game_id,
                    slug,
                    size: (size > 0).then_some(size),
                    error: None,
                }),
                Err(e) => {
                    warn!("Failed to cache game {}: {}", slug, e);
                    MessageReply::Game(GameReply {
                        success: false,
                        game_id,
                        slug,
                        size: None,
                        error: Some(e.to_string()),
                    })
                }
            },
        }
    }

    /// Handle a raw message and reply over `port` if one was supplied.
    ///
    /// Returns the reply as well, or `None` when the message was ignored.
    pub async fn post_message(
        &self,
        raw: Value,
        port: Option<oneshot::Sender<MessageReply>>,
    ) -> Option<MessageReply> {
        let reply = match WorkerMessage::parse(&raw) {
            Ok(Some(message)) => self.handle_message(message).await,
            Ok(None) => {
                debug!("Ignoring message without a known type");
                return None;
            }
            Err(e) => {
                warn!("Rejecting malformed message: {}", e);
                MessageReply::invalid(&raw, &e)
            }
        };

        if let Some(port) = port {
            if port.send(reply.clone()).is_err() {
                debug!("Message port closed before the reply was sent");
            }
        }
        Some(reply)
    }

    fn cache_resource(
        &self,
        url: &str,
        data: ResponseData,
        content_type: Option<&str>,
    ) -> Result<()> {
        let target = self.config.resolve(url)?;
        let response = FetchResponse::new(200, data.into_bytes()).with_header(
            "Content-Type",
            content_type.unwrap_or("application/octet-stream"),
        );

        let namespace = self.config.namespaces.game_resources.name();
        self.storage.put(&namespace, &cache_key(&target), &response)?;
        info!("Cached resource {} ({} bytes)", target, response.size());
        Ok(())
    }

    async fn cache_game(&self, game_url: &str) -> Result<u64> {
        let request = FetchRequest::get(self.config.resolve(game_url)?);
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_ok() {
            return Err(GameCacheError::HttpStatus {
                url: request.url.to_string(),
                status: response.status,
            });
        }

        let namespace = self.config.namespaces.game_resources.name();
        self.storage.put(&namespace, &request.cache_key(), &response)?;
        info!("Cached game {} ({} bytes)", request.url, response.size());
        Ok(response.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cache_game_resource() {
        let raw = json!({
            "type": "CACHE_GAME_RESOURCE",
            "url": "/__cached__/snake/index.html",
            "responseData": "<html></html>",
            "contentType": "text/html"
        });
        let message = WorkerMessage::parse(&raw).unwrap().unwrap();
        assert_eq!(
            message,
            WorkerMessage::CacheGameResource {
                url: "/__cached__/snake/index.html".into(),
                response_data: ResponseData::Text("<html></html>".into()),
                content_type: Some("text/html".into()),
            }
        );
    }

    #[test]
    fn test_parse_byte_array_payload() {
        let raw = json!({"type": "CACHE_GAME_RESOURCE", "url": "/a.bin", "responseData": [0, 1, 255]});
        match WorkerMessage::parse(&raw).unwrap().unwrap() {
            WorkerMessage::CacheGameResource { response_data, content_type, .. } => {
                assert_eq!(response_data.into_bytes(), Bytes::from_static(&[0, 1, 255]));
                assert!(content_type.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ignores_unknown_types() {
        assert!(WorkerMessage::parse(&json!({"type": "SKIP_WAITING"})).unwrap().is_none());
        assert!(WorkerMessage::parse(&json!({"url": "/a"})).unwrap().is_none());
        assert!(WorkerMessage::parse(&json!("CACHE_GAME")).unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let err = WorkerMessage::parse(&json!({"type": "CACHE_GAME_RESOURCE", "url": "/a"}))
            .unwrap_err();
        assert!(matches!(err, GameCacheError::InvalidMessage { .. }));
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = MessageReply::Resource(ResourceReply {
            success: true,
            url: "/a".into(),
            error: None,
        });
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"success": true, "url": "/a"}));

        let reply = MessageReply::Game(GameReply {
            success: false,
            game_id: json!(7),
            slug: "snake".into(),
            size: None,
            error: Some("offline".into()),
        });
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"success": false, "gameId": 7, "slug": "snake", "error": "offline"})
        );
    }

    #[test]
    fn test_invalid_reply_echoes_identifiers() {
        let raw = json!({"type": "CACHE_GAME", "gameId": "g1"});
        let err = GameCacheError::InvalidMessage {
            message: "missing field `gameUrl`".into(),
        };
        match MessageReply::invalid(&raw, &err) {
            MessageReply::Game(reply) => {
                assert!(!reply.success);
                assert_eq!(reply.game_id, json!("g1"));
                assert_eq!(reply.slug, "");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
