//! Outbound chat messages.

use std::future::Future;

use tracing::info;

use crate::helix::{HelixClient, HelixError};

/// Sends bot replies into the broadcaster's chat.
pub trait ChatSink: Send + Sync {
    fn send_message(&self, text: &str) -> impl Future<Output = Result<(), HelixError>> + Send;
}

/// The production sink: posts through the platform API when credentials are
/// configured, otherwise only logs what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct OutboundChat {
    helix: Option<HelixClient>,
}

impl OutboundChat {
    pub fn new(helix: Option<HelixClient>) -> Self {
        Self { helix }
    }
}

impl ChatSink for OutboundChat {
    async fn send_message(&self, text: &str) -> Result<(), HelixError> {
        match &self.helix {
            Some(client) => client.send_chat_message(text).await,
            None => {
                info!(text, "Chat reply (not sent: no platform credentials)");
                Ok(())
            }
        }
    }
}
