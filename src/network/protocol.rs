//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON text frames with a `type` tag.

use serde::{Deserialize, Deserializer, Serialize};

use crate::game::state::GameState;
use crate::game::types::{Direction, ParticipantId};
use crate::vote::ballot::{VoteId, VoteSnapshot};

// =============================================================================
// SHARED PAYLOADS
// =============================================================================

/// One chat line, as stored in the message log and broadcast to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub participant: ParticipantId,
    pub name: String,
    pub text: String,
    pub at_epoch_ms: i64,
}

/// Roster entry for `clients_update` and the sync payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub participant: ParticipantId,
    pub name: String,
    pub connected: bool,
}

/// Message-log entry: chat lines interleaved with archived votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    Chat { entry: ChatEntry },
    Vote { vote: VoteSnapshot },
}

/// One-time catch-up payload sent on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub message_history: Vec<LogEntry>,
    pub current_vote: Option<VoteSnapshot>,
    pub game_state: Option<GameState>,
    pub roster: Vec<ClientInfo>,
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Envelope around every inbound frame. `seq` is an optional client-chosen
/// correlation id, echoed back in the `ack` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub command: ClientMessage,
}

impl ClientEnvelope {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Distinguishes a field set to `null` (clear) from an absent field (leave
/// unchanged).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection. Must be the first message; everything else
    /// is rejected until it arrives.
    Hello { participant_id: ParticipantId, name: String },

    StartGame,
    StopGame,
    PauseGame,
    ResumeGame,

    /// Open a vote manually. Omitted timeout means the default countdown.
    StartVote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Cast or change this connection's ballot.
    RecordChoice { vote_id: VoteId, choice: Direction },

    /// Adjust the running vote: replace/clear the countdown and/or toggle
    /// the paused flag. `"timeout_ms": null` clears the countdown; an absent
    /// field leaves it alone.
    SetVoteTimeout {
        vote_id: VoteId,
        #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<Option<u64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paused: Option<bool>,
    },

    EndVote { vote_id: VoteId },
    CancelVote { vote_id: VoteId },

    Chat { text: String },
    Rename { name: String },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    VoteStarted { vote: VoteSnapshot },
    VoteUpdated { vote: VoteSnapshot },
    /// Carries the tallied result in `vote.result`.
    VoteEnded { vote: VoteSnapshot },
    VoteCancel { vote: VoteSnapshot },

    /// Full authoritative state; `null` after `stop_game`.
    GameState { state: Option<GameState> },

    ChatMessage { entry: ChatEntry },
    ClientsUpdate { clients: Vec<ClientInfo> },

    /// One-time catch-up on connect.
    Sync { payload: SyncPayload },

    /// Reply to an acked command, echoing the request's `seq`.
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        ok: bool,
    },

    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let env = ClientEnvelope::from_json(
            r#"{"type":"hello","participant_id":"abc","name":"Ada"}"#,
        )
        .unwrap();
        assert!(env.seq.is_none());
        match env.command {
            ClientMessage::Hello { participant_id, name } => {
                assert_eq!(participant_id.as_str(), "abc");
                assert_eq!(name, "Ada");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_seq_is_carried() {
        let env =
            ClientEnvelope::from_json(r#"{"type":"start_game","seq":7}"#).unwrap();
        assert_eq!(env.seq, Some(7));
    }

    #[test]
    fn test_set_vote_timeout_null_vs_absent() {
        let id = uuid::Uuid::new_v4();

        let clear = ClientEnvelope::from_json(&format!(
            r#"{{"type":"set_vote_timeout","vote_id":"{id}","timeout_ms":null}}"#
        ))
        .unwrap();
        match clear.command {
            ClientMessage::SetVoteTimeout { timeout_ms, paused, .. } => {
                assert_eq!(timeout_ms, Some(None), "explicit null clears");
                assert_eq!(paused, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let untouched = ClientEnvelope::from_json(&format!(
            r#"{{"type":"set_vote_timeout","vote_id":"{id}","paused":true}}"#
        ))
        .unwrap();
        match untouched.command {
            ClientMessage::SetVoteTimeout { timeout_ms, paused, .. } => {
                assert_eq!(timeout_ms, None, "absent field leaves the countdown alone");
                assert_eq!(paused, Some(true));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_server_message_round_trip() {
        let msg = ServerMessage::Ack { seq: Some(3), ok: true };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"ack\""));
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::Ack { seq, ok } => {
                assert_eq!(seq, Some(3));
                assert!(ok);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_game_state_null_after_stop() {
        let json = ServerMessage::GameState { state: None }.to_json().unwrap();
        assert!(json.contains("\"state\":null"));
    }
}
