//! The SMTP transport submits emails to a relay server using the SMTP protocol.
//!
//! This SMTP client follows [RFC 5321](https://tools.ietf.org/html/rfc5321)
//! and is tailored to authenticated submission: every session goes through
//! the same ordered steps, and any failure ends it.
//!
//! 1. connect to the server in plaintext and read its greeting
//! 2. `EHLO`, then `STARTTLS` and upgrade the connection, validating the
//!    server certificate against the configured server name
//! 3. `EHLO` again and `AUTH` (PLAIN, or LOGIN as a fallback)
//! 4. `MAIL FROM`, then one `RCPT TO` per recipient, in order
//! 5. `DATA`, the message content, and the end of data marker
//! 6. `QUIT`
//!
//! It implements the following extensions:
//!
//! * 8BITMIME ([RFC 6152](https://tools.ietf.org/html/rfc6152))
//! * SMTPUTF8 ([RFC 6531](https://tools.ietf.org/html/rfc6531))
//! * AUTH ([RFC 4954](http://tools.ietf.org/html/rfc4954)) with PLAIN and LOGIN mechanisms
//! * STARTTLS ([RFC 2487](http://tools.ietf.org/html/rfc2487))
//!
//! A server that does not offer `STARTTLS` is rejected before any credential
//! is sent.
//!
//! #### Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use mailshot::{
//!     transport::smtp::{extension::ClientId, SmtpTransport},
//!     Message, Transport,
//! };
//!
//! # fn main() -> Result<(), mailshot::Error> {
//! let mut email = Message::new("Happy new year", "Be happy!")
//!     .from("nobody@gmail.com")
//!     .credential("app-password");
//! email.add_recipient("hei@domain.tld");
//!
//! let mailer = SmtpTransport::builder()
//!     .hello_name(ClientId::Domain("my.hostname.tld".to_owned()))
//!     .timeout(Some(Duration::from_secs(30)))
//!     .build();
//!
//! mailer.send(&email)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub use self::transport::{SmtpTransport, SmtpTransportBuilder};
use self::{
    authentication::{Mechanism, DEFAULT_MECHANISMS},
    extension::ClientId,
};

pub mod authentication;
pub mod client;
pub mod commands;
pub mod extension;
pub mod response;
mod transport;

/// Server used when none is configured
pub const DEFAULT_SERVER: &str = "smtp.gmail.com";

/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;

// Recommended value from https://tools.ietf.org/html/rfc5321#section-4.5.3.2
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings of an [`SmtpTransport`]
///
/// With the `serde` feature, it can be loaded from a configuration file;
/// missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmtpInfo {
    /// Name sent during EHLO
    pub hello_name: ClientId,
    /// Server we are connecting to, also the name expected in its TLS certificate
    pub server: String,
    /// Port to connect to
    pub port: u16,
    /// Accepted authentication mechanisms, by order of preference
    pub authentication: Vec<Mechanism>,
    /// Network timeout applied to connection, reads and writes
    pub timeout: Option<Duration>,
}

impl Default for SmtpInfo {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            port: SUBMISSION_PORT,
            hello_name: ClientId::default(),
            authentication: DEFAULT_MECHANISMS.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}
