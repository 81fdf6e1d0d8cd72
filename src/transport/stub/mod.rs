//! The stub transport checks and records messages instead of sending them.
//! It can be useful for testing purposes.
//!
//! ```rust
//! use mailshot::{Message, StubTransport, Transport};
//!
//! # fn main() -> Result<(), mailshot::Error> {
//! let mut email = Message::new("Happy new year", "Be happy!")
//!     .from("nobody@domain.tld")
//!     .credential("secret");
//! email.add_recipient("hei@domain.tld");
//!
//! let sender = StubTransport::new_ok();
//! sender.send(&email)?;
//!
//! let sent = sender.messages();
//! assert_eq!(sent.len(), 1);
//! assert_eq!(sent[0].0.to(), ["hei@domain.tld"]);
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    address::Envelope,
    error::{self, Error},
    transport::smtp::authentication::Credentials,
    Transport,
};

/// This transport records the message envelope and content, and returns the
/// given response
#[derive(Debug, Clone)]
pub struct StubTransport {
    response: Result<(), StubError>,
    message_log: Arc<Mutex<Vec<(Envelope, String)>>>,
}

/// Error returned by a [`StubTransport`] created with [`StubTransport::new_error`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StubError;

impl fmt::Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stub error")
    }
}

impl std::error::Error for StubError {}

impl StubTransport {
    /// Creates a new transport that always returns the given response
    pub fn new(response: Result<(), StubError>) -> StubTransport {
        StubTransport {
            response,
            message_log: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Creates a new transport that always returns a success response
    pub fn new_ok() -> StubTransport {
        Self::new(Ok(()))
    }

    /// Creates a new transport that always returns an error
    pub fn new_error() -> StubTransport {
        Self::new(Err(StubError))
    }

    /// Return all logged messages sent using [`Transport::send_raw`]
    pub fn messages(&self) -> Vec<(Envelope, String)> {
        self.message_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    type Ok = ();
    type Error = Error;

    fn send_raw(
        &self,
        envelope: &Envelope,
        _credentials: &Credentials,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        #[cfg(feature = "tracing")]
        tracing::info!("from=<{}> to=<{:?}>", envelope.from(), envelope.to());

        self.message_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((envelope.clone(), String::from_utf8_lossy(email).into()));
        self.response.map_err(error::client)
    }
}
