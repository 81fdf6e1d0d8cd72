//! ### Sending Messages
//!
//! This section explains how to send the messages you have composed.
//!
//! The following transports are available:
//!
//! * The `SmtpTransport` submits the message over an authenticated, `STARTTLS`
//!   encrypted SMTP session. It is the transport used in production.
//! * The `StubTransport` checks and formats the message like the SMTP
//!   transport, records it and returns a preset result. It is useful for
//!   testing code that sends emails.

use crate::{address::Envelope, error::Error, transport::smtp::authentication::Credentials, Message};

pub mod smtp;
pub mod stub;

/// Blocking Transport method for emails
pub trait Transport {
    /// Response produced by the Transport
    type Ok;
    /// Error produced by the Transport
    type Error: From<Error>;

    /// Sends the email
    ///
    /// The sender, the recipients and the credential are checked before
    /// anything is handed to [`Transport::send_raw`], in that order.
    fn send(&self, message: &Message) -> Result<Self::Ok, Self::Error> {
        let envelope = message.envelope()?;
        let credentials = message.credentials()?;
        let raw = message.formatted();
        self.send_raw(&envelope, &credentials, &raw)
    }

    /// Sends an already formatted email
    fn send_raw(
        &self,
        envelope: &Envelope,
        credentials: &Credentials,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error>;
}
