//! obs-websocket v5 messages
//!
//! Every message is a JSON object `{"op": <u8>, "d": {...}}`. The session
//! starts with:
//!
//! ```text
//! Client                                   OBS
//!   |                                        |
//!   |<------ Hello (op 0) ------------------|  challenge + salt if auth is on
//!   |------- Identify (op 1) -------------->|  auth string + event mask
//!   |<------ Identified (op 2) -------------|
//!   |                                        |
//!   |<------ Event (op 5) ------------------|
//!   |------- Request (op 6) --------------->|
//!   |<------ RequestResponse (op 7) --------|
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::bridge::SwitcherEvent;
use crate::error::Result;

/// Op codes
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// Event subscription bits
pub mod subscription {
    /// High-volume: an input became (in)active in program
    pub const INPUT_ACTIVE_STATE_CHANGED: u32 = 1 << 17;
    /// High-volume: an input started or stopped showing anywhere (preview included)
    pub const INPUT_SHOW_STATE_CHANGED: u32 = 1 << 18;

    /// Subscriptions needed for tally
    pub const TALLY: u32 = INPUT_ACTIVE_STATE_CHANGED | INPUT_SHOW_STATE_CHANGED;
}

/// RPC version spoken by this client
pub const RPC_VERSION: u32 = 1;

/// Raw message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    pub d: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `GetVersion` response data
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsVersion {
    pub obs_version: String,
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputActiveStateChanged {
    input_name: String,
    video_active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputShowStateChanged {
    input_name: String,
    video_showing: bool,
}

/// Compute the `Identify.authentication` string
///
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, auth: &AuthChallenge) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{}{}", password, auth.salt)));
    BASE64.encode(Sha256::digest(format!("{}{}", secret, auth.challenge)))
}

/// Serialize a payload into an envelope
pub fn encode<T: Serialize>(op: u8, payload: &T) -> Result<String> {
    let envelope = Envelope {
        op,
        d: serde_json::to_value(payload)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a text frame into an envelope
pub fn decode(text: &str) -> Result<Envelope> {
    Ok(serde_json::from_str(text)?)
}

impl Event {
    /// Map to a switcher event
    ///
    /// `InputActiveStateChanged` means "in program"; `InputShowStateChanged`
    /// means "visible somewhere", which covers preview. Tally events with a
    /// payload we cannot read are reported as `Other`.
    pub fn to_switcher_event(&self) -> SwitcherEvent {
        match self.event_type.as_str() {
            "InputActiveStateChanged" => {
                match serde_json::from_value::<InputActiveStateChanged>(self.event_data.clone()) {
                    Ok(data) => SwitcherEvent::program(data.input_name, data.video_active),
                    Err(_) => SwitcherEvent::Other(self.event_type.clone()),
                }
            }
            "InputShowStateChanged" => {
                match serde_json::from_value::<InputShowStateChanged>(self.event_data.clone()) {
                    Ok(data) => SwitcherEvent::preview(data.input_name, data.video_showing),
                    Err(_) => SwitcherEvent::Other(self.event_type.clone()),
                }
            }
            _ => SwitcherEvent::Other(self.event_type.clone()),
        }
    }
}
