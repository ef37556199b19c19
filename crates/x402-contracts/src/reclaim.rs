//! Reclaim requests: releasing a reservation that was never executed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who is asking for the reclaim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerType {
    /// The owning agent, authenticated by its own signature.
    Agent,
    /// The sequencer itself: an operator holding the admin token, or the
    /// internal expiry sweep.
    Sequencer,
}

impl CallerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Sequencer => "sequencer",
        }
    }
}

impl fmt::Display for CallerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to reclaim one authorization.
///
/// For `CallerType::Agent`, `agent_sig` must be the agent's scheme signature
/// over the canonical reclaim bytes (auth id, caller type, requested-at).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimRequest {
    pub auth_id: String,
    pub caller_type: CallerType,
    pub requested_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_sig: Option<String>,
}

impl ReclaimRequest {
    /// A sequencer-initiated reclaim, as issued by the sweep or an operator.
    pub fn by_sequencer(auth_id: impl Into<String>, requested_at: i64) -> Self {
        Self {
            auth_id: auth_id.into(),
            caller_type: CallerType::Sequencer,
            requested_at,
            agent_sig: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimResponse {
    pub ok: bool,
    pub auth_id: String,
    /// Micros returned to the agent's available balance by this reclaim.
    /// Zero when a FAILED report had already released the reservation.
    pub released_micros: u64,
}
