//! Outbound message path.
//!
//! A [`Sender`] turns user text into a [`Message`], delivers it with one
//! form POST according to the deployment's [`SendPolicy`], and converts the
//! outcome into a [`DispatchUnit`]: the original message for local echo on
//! success, a system notice otherwise.

use ed25519_dalek::SigningKey;
use tchat_proto::identity::{ServiceId, strip_onion_suffix};
use tchat_proto::message::{CodecError, Message};
use tchat_proto::signing::SignedMessage;
use tchat_proto::wire::{SEND_PATH, SendForm};

use crate::config::SendPolicy;
use crate::crypto::Keypair;
use crate::transport::http::{HttpError, HttpTransport, ReqwestTransport};

use super::DispatchUnit;

/// Errors from a single send attempt. All are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The HTTP client for the active policy could not be built.
    #[error(transparent)]
    Client(HttpError),

    /// The message could not be encoded.
    #[error("error sending message: {0}")]
    Encode(#[from] CodecError),

    /// The request failed before a status was received.
    #[error("error sending message: {0}")]
    Network(HttpError),

    /// The receiver answered with a status other than 200.
    #[error("error sending message: received status code {status}{}", body_suffix(.body))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// Builds, signs and delivers messages to one peer.
pub struct Sender<H> {
    transport: H,
    policy: SendPolicy,
    destination: String,
    service_id: ServiceId,
    signing: SigningKey,
}

impl Sender<ReqwestTransport> {
    /// Build a sender with the reqwest transport the policy calls for:
    /// tunnelled through the SOCKS5 proxy for signed sends, direct for the
    /// private channel.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Client`] if the HTTP client cannot be built.
    pub fn from_policy(
        policy: SendPolicy,
        destination: &str,
        keypair: &Keypair,
    ) -> Result<Self, SendError> {
        let transport = match &policy {
            SendPolicy::Signed { proxy_address } => ReqwestTransport::via_socks(proxy_address),
            SendPolicy::PrivateChannel { .. } => ReqwestTransport::direct(),
        }
        .map_err(SendError::Client)?;
        Ok(Self::new(transport, policy, destination, keypair))
    }
}

impl<H: HttpTransport> Sender<H> {
    /// Create a sender over an explicit transport.
    ///
    /// A trailing `.onion` on `destination` is stripped.
    pub fn new(transport: H, policy: SendPolicy, destination: &str, keypair: &Keypair) -> Self {
        let destination = strip_onion_suffix(destination.trim()).to_string();
        if let Err(e) = ServiceId::parse(&destination) {
            tracing::warn!(destination = %destination, err = %e, "destination is not a valid service id");
        }
        Self {
            transport,
            policy,
            destination,
            service_id: keypair.service_id(),
            signing: keypair.signing_key().clone(),
        }
    }

    /// The normalized peer id messages are addressed to.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// This client's own service id, used as the author of every message.
    #[must_use]
    pub const fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Where the POST for the active policy goes.
    #[must_use]
    pub fn target_url(&self) -> String {
        match &self.policy {
            SendPolicy::Signed { .. } => format!("http://{}.onion{SEND_PATH}", self.destination),
            SendPolicy::PrivateChannel { server_address } => {
                format!("http://{server_address}{SEND_PATH}")
            }
        }
    }

    /// Attribute `text` to this client.
    #[must_use]
    pub fn build_message(&self, text: &str) -> Message {
        Message::new(&self.service_id, text)
    }

    /// POST one message. On success the message is handed back for echo.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if encoding fails, the request fails, or the
    /// response status is not 200.
    pub async fn deliver(&self, message: Message) -> Result<Message, SendError> {
        let (form, message) = match &self.policy {
            SendPolicy::Signed { .. } => {
                let signed = SignedMessage::new(&self.signing, message)?;
                (SendForm::signed(&signed), signed.message)
            }
            SendPolicy::PrivateChannel { .. } => {
                let form = SendForm::private(&self.destination, &message)?;
                (form, message)
            }
        };

        let url = self.target_url();
        tracing::debug!(url = %url, "posting message");
        let response = self
            .transport
            .post_form(&url, &form.fields())
            .await
            .map_err(SendError::Network)?;

        if response.status != 200 {
            return Err(SendError::Rejected {
                status: response.status,
                body: response.body,
            });
        }
        Ok(message)
    }

    /// Build and deliver `text`, reporting the outcome as a dispatch unit.
    pub async fn send(&self, text: &str) -> DispatchUnit {
        match self.deliver(self.build_message(text)).await {
            Ok(message) => DispatchUnit::Chat(message),
            Err(e) => {
                tracing::warn!(err = %e, destination = %self.destination, "send failed");
                DispatchUnit::system(e)
            }
        }
    }
}
