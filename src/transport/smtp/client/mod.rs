//! SMTP client
//!
//! `SmtpConnection` allows manually sending SMTP commands over a stream
//! obtained from a [`Connector`](net::Connector).
//!
//! ```rust
//! use mailshot::transport::smtp::{
//!     client::{mock::MockConnector, SmtpConnection},
//!     extension::ClientId,
//! };
//!
//! # fn main() -> Result<(), mailshot::Error> {
//! let connector = MockConnector::new([
//!     "220 smtp.example.com ESMTP",
//!     "250-smtp.example.com",
//!     "250 8BITMIME",
//!     "250 2.0.0 OK",
//!     "221 2.0.0 Bye",
//! ]);
//! let hello = ClientId::Domain("my_hostname".to_owned());
//!
//! let mut client = SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello)?;
//! assert!(client.test_connected());
//! client.quit()?;
//! # Ok(())
//! # }
//! ```

pub use self::connection::{DataWriter, SmtpConnection};

mod connection;
pub mod mock;
pub mod net;

/// The codec used for transparency
///
/// Lines of the payload starting with a dot get an extra one
/// ([RFC 5321, section 4.5.2](https://tools.ietf.org/html/rfc5321#section-4.5.2)).
#[derive(Clone, Copy, Debug)]
pub struct ClientCodec {
    escape_count: u8,
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCodec {
    /// Creates a new client codec, positioned at the start of a line
    pub fn new() -> Self {
        ClientCodec { escape_count: 2 }
    }

    /// Adds transparency
    ///
    /// An empty frame writes the end of data marker.
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        if frame.is_empty() {
            match self.escape_count {
                0 => buf.extend_from_slice(b"\r\n.\r\n"),
                1 => buf.extend_from_slice(b"\n.\r\n"),
                _ => buf.extend_from_slice(b".\r\n"),
            }
            self.escape_count = 2;
            return;
        }

        let mut start = 0;
        for (idx, byte) in frame.iter().enumerate() {
            match self.escape_count {
                1 if *byte == b'\n' => self.escape_count = 2,
                2 if *byte == b'.' => self.escape_count = 3,
                _ => self.escape_count = if *byte == b'\r' { 1 } else { 0 },
            }
            if self.escape_count == 3 {
                self.escape_count = 0;
                buf.extend_from_slice(&frame[start..idx]);
                buf.push(b'.');
                start = idx;
            }
        }
        buf.extend_from_slice(&frame[start..]);
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
///
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}
