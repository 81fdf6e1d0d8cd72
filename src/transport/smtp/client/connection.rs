use std::{
    fmt::Display,
    io::{BufRead, BufReader, Write},
    time::Duration,
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{
    net::{Connector, SmtpStream},
    ClientCodec,
};
use crate::{
    address::Envelope,
    error::{self, Error},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        commands::{Auth, Data, Ehlo, Mail, Noop, Quit, Rcpt, Starttls},
        extension::{ClientId, Extension, MailBodyParameter, MailParameter, ServerInfo},
        response::{parse_response, Response},
    },
};

/// Structure that implements the SMTP client
pub struct SmtpConnection<S: SmtpStream> {
    /// Stream between client and server
    stream: BufReader<S>,
    /// Whether QUIT has been sent
    sent_quit: bool,
    /// A read or write failed, or the server sent garbage
    broken: bool,
    /// Information about the server
    server_info: ServerInfo,
}

impl<S: SmtpStream> SmtpConnection<S> {
    /// Get information about the server
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Connects to `server` through `connector`
    ///
    /// Reads the greeting, sends EHLO and parses server information
    pub fn connect<C>(
        connector: &C,
        server: &str,
        port: u16,
        timeout: Option<Duration>,
        hello_name: &ClientId,
    ) -> Result<SmtpConnection<S>, Error>
    where
        C: Connector<Stream = S>,
    {
        let stream = connector.connect(server, port, timeout)?;
        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            sent_quit: false,
            broken: false,
            server_info: ServerInfo::default(),
        };

        let _greeting = conn.read_response()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("connected to {}:{}", server, port);

        conn.ehlo(hello_name)?;

        // Print server information
        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", conn.server_info);
        Ok(conn)
    }

    /// Runs the mail transaction: `MAIL FROM`, `RCPT TO` for each
    /// recipient, then `DATA`
    pub fn send(&mut self, envelope: &Envelope, email: &[u8]) -> Result<Response, Error> {
        // Mail
        let mut mail_options = vec![];

        // Internationalization handling
        //
        // * 8BITMIME: https://tools.ietf.org/html/rfc6152
        // * SMTPUTF8: https://tools.ietf.org/html/rfc6531

        // Check for non-ascii addresses and use the SMTPUTF8 option if any.
        if envelope.has_non_ascii_addresses() {
            if !self.server_info().supports_feature(Extension::SmtpUtfEight) {
                // don't try to send non-ascii addresses (per RFC)
                return Err(error::client(
                    "Envelope contains non-ascii chars but server does not support SMTPUTF8",
                ));
            }
            mail_options.push(MailParameter::SmtpUtfEight);
        }

        // Check for non-ascii content in the message
        if !email.is_ascii() {
            if !self.server_info().supports_feature(Extension::EightBitMime) {
                return Err(error::client(
                    "Message contains non-ascii chars but server does not support 8BITMIME",
                ));
            }
            mail_options.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }

        self.command(Mail::new(envelope.from().to_owned(), mail_options))
            .map_err(error::sender_rejected)?;

        // Recipient
        for to_address in envelope.to() {
            self.command(Rcpt::new(to_address.clone()))?;
        }

        // Message content
        let mut data = self.data()?;
        data.write(email)?;
        data.finish()
    }

    /// Whether the connection can no longer be used
    pub fn has_broken(&self) -> bool {
        self.sent_quit || self.broken
    }

    /// Upgrades the connection with STARTTLS, then sends EHLO again
    ///
    /// Fails without writing anything if the server does not offer STARTTLS.
    pub fn starttls(&mut self, domain: &str, hello_name: &ClientId) -> Result<(), Error> {
        if !self.server_info.supports_feature(Extension::StartTls) {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        // Bytes received before the handshake must never pass as encrypted replies
        if !self.stream.buffer().is_empty() {
            self.broken = true;
            return Err(error::client("Server sent data after the STARTTLS reply"));
        }
        self.stream.get_mut().upgrade_tls(domain)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");
        // Send EHLO again
        self.ehlo(hello_name)
    }

    /// Send EHLO and update server info
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        let ehlo_response = self.command(Ehlo::new(hello_name.clone()))?;
        self.server_info = ServerInfo::from_response(&ehlo_response)?;
        Ok(())
    }

    /// Sends QUIT
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.sent_quit = true;
        self.command(Quit)
    }

    /// Sends QUIT if the connection still works, and shuts it down
    pub fn abort(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("aborting connection");

        // Only try to quit if we are not already broken
        if !self.sent_quit && !self.broken {
            let _ = self.quit();
        }

        let _ = self.stream.get_mut().shutdown();
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Checks if the server is connected using the NOOP SMTP command
    pub fn test_connected(&mut self) -> bool {
        self.command(Noop).is_ok()
    }

    /// Sends an AUTH command with the given mechanism, and handles the challenge if needed
    ///
    /// The first mechanism of `mechanisms` the server offers is used.
    pub fn auth(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<Response, Error> {
        let mechanism = self
            .server_info
            .get_auth_mechanism(mechanisms)
            .ok_or_else(|| error::client("No compatible authentication mechanism was found"))?;

        // Limit challenges to avoid blocking
        let mut challenges = 10;
        let mut response = self.auth_command(&Auth::new(mechanism, credentials, None)?)?;

        while challenges > 0 && response.has_code(334) {
            challenges -= 1;
            response =
                self.auth_command(&Auth::new_from_response(mechanism, credentials, &response)?)?;
        }

        if response.has_code(334) {
            Err(error::response("Unexpected number of challenges"))
        } else {
            Ok(response)
        }
    }

    /// Sends DATA and opens the message content channel
    pub fn data(&mut self) -> Result<DataWriter<'_, S>, Error> {
        self.command(Data)?;
        Ok(DataWriter {
            connection: self,
            codec: ClientCodec::new(),
            finished: false,
        })
    }

    /// Sends the message content
    pub fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut data = self.data()?;
        data.write(message)?;
        data.finish()
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        self.read_response()
    }

    /// Sends an AUTH command without logging the credentials
    fn auth_command(&mut self, command: &Auth) -> Result<Response, Error> {
        self.write_bytes(command.to_string().as_bytes())?;
        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {}", command.redacted());
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.write_bytes(string)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {}", escape_crlf(&String::from_utf8_lossy(string)));
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.broken {
            return Err(error::client("Connection is broken"));
        }

        let result = self
            .stream
            .get_mut()
            .write_all(bytes)
            .and_then(|()| self.stream.get_mut().flush());
        if let Err(err) = result {
            self.broken = true;
            return Err(error::network(err));
        }
        Ok(())
    }

    /// Gets the SMTP response
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        loop {
            let read = match self.stream.read_line(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    self.broken = true;
                    return Err(error::network(err));
                }
            };
            if read == 0 {
                break;
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect::<Vec<_>>().join(" ")),
                        ))
                    };
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                    self.broken = true;
                    return Err(error::response(e.to_string()));
                }
            }
        }

        self.broken = true;
        Err(error::response("incomplete response"))
    }
}

/// The open `DATA` channel of a transaction
///
/// Content written here is dot-stuffed. [`DataWriter::finish`] sends the end
/// of data marker and reads the server verdict; a writer dropped before
/// being finished still sends the marker so the server closes the transaction.
pub struct DataWriter<'a, S: SmtpStream> {
    connection: &'a mut SmtpConnection<S>,
    codec: ClientCodec,
    finished: bool,
}

impl<S: SmtpStream> DataWriter<'_, S> {
    /// Writes message content
    pub fn write(&mut self, content: &[u8]) -> Result<(), Error> {
        let mut out_buf = Vec::with_capacity(content.len());
        self.codec.encode(content, &mut out_buf);
        self.connection.write(&out_buf)
    }

    /// Ends the message content and reads the response
    pub fn finish(mut self) -> Result<Response, Error> {
        self.finished = true;
        self.end_of_data()?;
        self.connection.read_response()
    }

    fn end_of_data(&mut self) -> Result<(), Error> {
        let mut out_buf = Vec::with_capacity(5);
        self.codec.encode(&[], &mut out_buf);
        self.connection.write(&out_buf)
    }
}

impl<S: SmtpStream> Drop for DataWriter<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            #[cfg(feature = "tracing")]
            tracing::debug!("closing unfinished message content");
            let _ = self.end_of_data();
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Cursor, Read};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::client::mock::MockConnector;

    fn hello() -> ClientId {
        ClientId::Domain("client.example.org".to_owned())
    }

    #[test]
    fn connect_reads_greeting_and_ehlo() {
        let connector = MockConnector::new([
            "220 smtp.gmail.com ESMTP ready",
            "250-smtp.gmail.com at your service",
            "250-8BITMIME",
            "250 STARTTLS",
        ]);

        let conn =
            SmtpConnection::connect(&connector, "smtp.gmail.com", 587, None, &hello()).unwrap();

        assert_eq!(connector.written(), "EHLO client.example.org\r\n");
        assert_eq!(conn.server_info().name(), "smtp.gmail.com");
        assert!(conn.server_info().supports_feature(Extension::StartTls));
        assert!(!conn.is_encrypted());
    }

    /// Serves `plaintext` until the TLS upgrade, then `encrypted`
    struct SplitConnector {
        plaintext: &'static str,
        encrypted: &'static str,
    }

    struct SplitStream {
        plaintext: Cursor<&'static [u8]>,
        encrypted: Cursor<&'static [u8]>,
        upgraded: bool,
    }

    impl Connector for SplitConnector {
        type Stream = SplitStream;

        fn connect(&self, _: &str, _: u16, _: Option<Duration>) -> Result<SplitStream, Error> {
            Ok(SplitStream {
                plaintext: Cursor::new(self.plaintext.as_bytes()),
                encrypted: Cursor::new(self.encrypted.as_bytes()),
                upgraded: false,
            })
        }
    }

    impl SmtpStream for SplitStream {
        fn upgrade_tls(&mut self, _domain: &str) -> Result<(), Error> {
            self.upgraded = true;
            Ok(())
        }

        fn is_encrypted(&self) -> bool {
            self.upgraded
        }

        fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for SplitStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.upgraded {
                self.encrypted.read(buf)
            } else {
                self.plaintext.read(buf)
            }
        }
    }

    impl Write for SplitStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn starttls_reads_ehlo_over_tls() {
        let connector = SplitConnector {
            plaintext: "220 hi\r\n250-smtp.example.com\r\n250 STARTTLS\r\n220 go\r\n",
            encrypted: "250-smtp.real\r\n250 AUTH PLAIN\r\n",
        };
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        conn.starttls("smtp.example.com", &hello()).unwrap();

        assert!(conn.is_encrypted());
        assert_eq!(conn.server_info().name(), "smtp.real");
        assert!(conn
            .server_info()
            .supports_auth_mechanism(Mechanism::Plain));
    }

    #[test]
    fn starttls_rejects_replies_sent_before_handshake() {
        let connector = SplitConnector {
            plaintext: concat!(
                "220 hi\r\n",
                "250-smtp.example.com\r\n",
                "250 STARTTLS\r\n",
                "220 go\r\n",
                "250-evil\r\n",
                "250 AUTH LOGIN\r\n",
            ),
            encrypted: "250-smtp.real\r\n250 AUTH PLAIN\r\n",
        };
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let err = conn.starttls("smtp.example.com", &hello()).unwrap_err();

        assert!(err.is_transport());
        assert!(!err.is_tls());
        assert!(conn.has_broken());
        assert!(!conn.is_encrypted());
        assert_eq!(conn.server_info().name(), "smtp.example.com");
    }

    #[test]
    fn starttls_requires_server_support() {
        let connector = MockConnector::new(["220 ready", "250 smtp.example.com"]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let err = conn.starttls("smtp.example.com", &hello()).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(connector.written(), "EHLO client.example.org\r\n");
    }

    #[test]
    fn auth_login_challenges() {
        let connector = MockConnector::new([
            "220 ready",
            "250-smtp.example.com",
            "250 AUTH LOGIN",
            "334 VXNlcm5hbWU6",
            "334 UGFzc3dvcmQ6",
            "235 2.7.0 Accepted",
        ]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        let response = conn
            .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .unwrap();

        assert!(response.has_code(235));
        assert_eq!(
            connector.written(),
            "EHLO client.example.org\r\nAUTH LOGIN\r\ndXNlcg==\r\ncGFzc3dvcmQ=\r\n"
        );
    }

    #[test]
    fn auth_challenge_limit() {
        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        let session = |challenges: usize| {
            let mut replies = vec!["220 ready", "250-smtp.example.com", "250 AUTH LOGIN"];
            replies.extend(std::iter::repeat("334 VXNlcm5hbWU6").take(challenges));
            replies.push("235 2.7.0 Accepted");
            MockConnector::new(replies)
        };

        let connector = session(10);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();
        let response = conn.auth(&[Mechanism::Login], &credentials).unwrap();
        assert!(response.has_code(235));

        let connector = session(11);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();
        let err = conn.auth(&[Mechanism::Login], &credentials).unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_authentication());
    }

    #[test]
    fn auth_without_common_mechanism() {
        let connector = MockConnector::new(["220 ready", "250-smtp.example.com", "250 AUTH XOAUTH2"]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        assert!(conn.auth(&[Mechanism::Plain], &credentials).is_err());
    }

    #[test]
    fn data_is_dot_stuffed_and_terminated() {
        let connector = MockConnector::new([
            "220 ready",
            "250 smtp.example.com",
            "354 Go ahead",
            "250 2.0.0 OK",
        ]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let response = conn.message(b"Subject: dots\r\n\r\n.\r\nend\r\n").unwrap();

        assert!(response.has_code(250));
        assert_eq!(
            connector.written(),
            "EHLO client.example.org\r\nDATA\r\nSubject: dots\r\n\r\n..\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn dropped_data_writer_ends_transaction() {
        let connector = MockConnector::new([
            "220 ready",
            "250 smtp.example.com",
            "354 Go ahead",
        ]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        {
            let mut data = conn.data().unwrap();
            data.write(b"partial").unwrap();
        }

        assert!(connector.written().ends_with("DATA\r\npartial\r\n.\r\n"));
    }

    #[test]
    fn negative_reply_is_an_error() {
        let connector = MockConnector::new([
            "220 ready",
            "250 smtp.example.com",
            "550 5.1.1 No such user",
        ]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        let err = conn
            .command(Rcpt::new("nobody@example.com".to_owned()))
            .unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.status().map(u16::from), Some(550));
        assert!(!conn.has_broken());
    }

    #[test]
    fn closed_stream_breaks_connection() {
        let connector = MockConnector::new(["220 ready", "250 smtp.example.com"]);
        let mut conn =
            SmtpConnection::connect(&connector, "smtp.example.com", 587, None, &hello()).unwrap();

        assert!(!conn.test_connected());
        assert!(conn.has_broken());

        conn.abort();
        assert!(connector.was_shut_down());
        assert!(!connector.written().contains("QUIT"));
    }
}
