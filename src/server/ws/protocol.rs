use serde::{Deserialize, Serialize};

pub const WS_APP_PROTOCOL: &str = "intellidesk.v1";
pub const WS_TOKEN_PREFIX: &str = "intellidesk-token.";

#[derive(Debug, Deserialize, Default)]
pub struct ProgressQuery {
    #[serde(rename = "documentId")]
    pub document_id: Option<String>,
}

/// First frame on a progress socket, sent once the subscription is live.
#[derive(Debug, Serialize)]
pub struct SubscriptionAck<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    #[serde(rename = "documentId")]
    pub document_id: Option<&'a str>,
}

impl<'a> SubscriptionAck<'a> {
    pub fn new(document_id: Option<&'a str>) -> Self {
        Self {
            msg_type: "subscribed",
            document_id,
        }
    }
}
