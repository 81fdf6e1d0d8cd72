//! Scripted, in-memory network collaborator
//!
//! The [`MockConnector`] replays server replies and records everything the
//! client writes, so a whole SMTP session can run without a server. Each read
//! returns at most one complete reply, as a server answering one command at
//! a time would send it.
//!
//! ```rust
//! use mailshot::{
//!     transport::smtp::{client::mock::MockConnector, SmtpTransport},
//!     Message, Transport,
//! };
//!
//! let connector = MockConnector::new(["554 5.7.0 Go away"]);
//! let mailer = SmtpTransport::builder().connector(connector.clone()).build();
//!
//! let mut email = Message::new("Hi", "Hello").from("a@gmail.com").credential("pw");
//! email.add_recipient("b@example.com");
//!
//! assert!(mailer.send(&email).is_err());
//! assert!(connector.connect_invoked());
//! ```

use std::{
    io::{self, Read, Write},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::net::{Connector, SmtpStream};
use crate::error::{self, Error};

#[derive(Debug, Default)]
struct MockLog {
    connect_invoked: bool,
    server: Option<(String, u16)>,
    written: Vec<u8>,
    tls_domain: Option<String>,
    encrypted_from: Option<usize>,
    shut_down: bool,
}

/// Connector replaying a fixed list of replies
///
/// Clones share the same record, keep one to inspect the session afterwards.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Vec<u8>,
    refuse_connection: bool,
    fail_tls: bool,
    log: Arc<Mutex<MockLog>>,
}

impl MockConnector {
    /// Creates a connector replaying `replies`, one reply line per item
    ///
    /// Multiline replies are given as several items (`250-...`, then `250 ...`).
    pub fn new<I, S>(replies: I) -> MockConnector
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut script = Vec::new();
        for reply in replies {
            script.extend_from_slice(reply.as_ref().as_bytes());
            script.extend_from_slice(b"\r\n");
        }

        MockConnector {
            script,
            refuse_connection: false,
            fail_tls: false,
            log: Arc::new(Mutex::new(MockLog::default())),
        }
    }

    /// Fails every connection attempt
    pub fn refuse_connection(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    /// Fails the TLS handshake
    pub fn fail_tls(mut self) -> Self {
        self.fail_tls = true;
        self
    }

    /// Whether a connection was attempted
    pub fn connect_invoked(&self) -> bool {
        self.log().connect_invoked
    }

    /// Server and port of the last connection attempt
    pub fn server(&self) -> Option<(String, u16)> {
        self.log().server.clone()
    }

    /// Everything written by the client
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.log().written).into_owned()
    }

    /// What the client wrote after the TLS upgrade
    pub fn written_encrypted(&self) -> String {
        let log = self.log();
        match log.encrypted_from {
            Some(from) => String::from_utf8_lossy(&log.written[from..]).into_owned(),
            None => String::new(),
        }
    }

    /// Name the server certificate was validated against
    pub fn tls_domain(&self) -> Option<String> {
        self.log().tls_domain.clone()
    }

    /// Whether the client shut the connection down
    pub fn was_shut_down(&self) -> bool {
        self.log().shut_down
    }

    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MockConnector {
    type Stream = MockStream;

    fn connect(
        &self,
        server: &str,
        port: u16,
        _timeout: Option<Duration>,
    ) -> Result<MockStream, Error> {
        {
            let mut log = self.log();
            log.connect_invoked = true;
            log.server = Some((server.to_owned(), port));
        }

        if self.refuse_connection {
            return Err(error::connection(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            )));
        }

        Ok(MockStream {
            script: self.script.clone(),
            position: 0,
            encrypted: false,
            fail_tls: self.fail_tls,
            log: Arc::clone(&self.log),
        })
    }
}

/// Stream produced by a [`MockConnector`]
#[derive(Debug)]
pub struct MockStream {
    script: Vec<u8>,
    position: usize,
    encrypted: bool,
    fail_tls: bool,
    log: Arc<Mutex<MockLog>>,
}

impl MockStream {
    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SmtpStream for MockStream {
    fn upgrade_tls(&mut self, domain: &str) -> Result<(), Error> {
        if self.fail_tls {
            return Err(error::tls("handshake failure"));
        }

        {
            let mut log = self.log();
            log.tls_domain = Some(domain.to_owned());
            log.encrypted_from = Some(log.written.len());
        }
        self.encrypted = true;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.log().shut_down = true;
        Ok(())
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.script[self.position..];
        let len = reply_length(remaining).min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.position += len;
        Ok(len)
    }
}

/// Length of the first reply of `script`, up to its last line
fn reply_length(script: &[u8]) -> usize {
    let mut end = 0;
    for line in script.split_inclusive(|&b| b == b'\n') {
        end += line.len();
        if line.get(3) != Some(&b'-') {
            break;
        }
    }
    end
}

impl Write for MockStream {
    fn write(&mut self, msg: &[u8]) -> io::Result<usize> {
        self.log().written.extend_from_slice(msg);
        Ok(msg.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
