use livekit_api::access_token::{AccessToken, VideoGrants};

use crate::agent::RoomError;

/// Who the agent appears as inside the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub identity: String,
    pub name: String,
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self {
            identity: "paradise-agent".to_string(),
            name: "Paradise".to_string(),
        }
    }
}

/// Sign a room-join token for the agent itself.
pub fn mint_agent_token(
    api_key: &str,
    api_secret: &str,
    room_name: &str,
    agent: &AgentIdentity,
) -> Result<String, RoomError> {
    if api_key.is_empty() || api_secret.is_empty() {
        return Err(RoomError::ConnectionFailed(
            "LiveKit API key and secret are required to mint a token".to_string(),
        ));
    }
    if room_name.trim().is_empty() {
        return Err(RoomError::ConnectionFailed("Room name is empty".to_string()));
    }

    AccessToken::with_api_key(api_key, api_secret)
        .with_identity(&agent.identity)
        .with_name(&agent.name)
        .with_grants(VideoGrants {
            room_join: true,
            room: room_name.to_string(),
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
            ..Default::default()
        })
        .to_jwt()
        .map_err(|e| RoomError::ConnectionFailed(format!("Failed to sign access token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_token_produces_jwt() {
        let token = mint_agent_token("devkey", "secret-secret-secret-secret", "trip", &AgentIdentity::default())
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_mint_token_rejects_missing_credentials() {
        let err = mint_agent_token("", "secret", "trip", &AgentIdentity::default()).unwrap_err();
        assert!(matches!(err, RoomError::ConnectionFailed(_)));

        let err = mint_agent_token("key", "secret", "  ", &AgentIdentity::default()).unwrap_err();
        assert!(err.to_string().contains("Room name"));
    }
}
