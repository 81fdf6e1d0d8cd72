//! Composition and MIME formatting of messages
//!
//! A [`Message`] is created with its subject and body, then receives a
//! sender, a credential, recipients and attachments.
//!
//! ```rust
//! use mailshot::Message;
//!
//! # fn main() -> Result<(), mailshot::Error> {
//! let mut email = Message::new("Happy new year", "Be happy!")
//!     .from("nobody@domain.tld")
//!     .display_name("NoBody")
//!     .credential("secret")
//!     .boundary("F2mTKN843loAAAAA8porEdAjCKhArPxGeahYoZYS");
//! email.add_recipient("hei@domain.tld");
//! email.attach_content("greeting.txt", "Hello");
//! # Ok(())
//! # }
//! ```
//!
//! Which produces:
//!
//! ```sh
//! Subject: Happy new year
//! MIME-Version: 1.0
//! From: NoBody <nobody@domain.tld>
//! Content-Type: multipart/mixed; boundary="F2mTKN843loAAAAA8porEdAjCKhArPxGeahYoZYS"
//!
//! --F2mTKN843loAAAAA8porEdAjCKhArPxGeahYoZYS
//! Content-Type: text/plain; charset=utf-8
//!
//! Be happy!
//! --F2mTKN843loAAAAA8porEdAjCKhArPxGeahYoZYS
//! Content-Type: application/octet-stream
//! Content-Transfer-Encoding: base64
//! Content-Disposition: attachment; filename="greeting.txt"
//!
//! SGVsbG8=
//! --F2mTKN843loAAAAA8porEdAjCKhArPxGeahYoZYS--
//! ```
//!
//! Without attachments the body is sent as a single part and no boundary
//! appears in the output. No `To` header is written: recipients only appear
//! in the SMTP envelope.

use std::{fmt, fs, path::Path};

pub use self::attachment::{Attachment, Attachments};
use crate::{
    address::Envelope,
    error::{self, Error, MissingField},
    transport::smtp::authentication::Credentials,
};

mod attachment;
mod encoder;

/// Content type of the body when none was set
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// An email message with optional file attachments
#[derive(Clone)]
pub struct Message {
    subject: String,
    body: String,
    from: String,
    display_name: String,
    credential: String,
    content_type: String,
    recipients: Vec<String>,
    attachments: Attachments,
    boundary: String,
}

impl Message {
    /// Creates a message with no recipients and no attachments
    pub fn new<S: Into<String>, B: Into<String>>(subject: S, body: B) -> Self {
        Message {
            subject: subject.into(),
            body: body.into(),
            from: String::new(),
            display_name: String::new(),
            credential: String::new(),
            content_type: String::new(),
            recipients: Vec::new(),
            attachments: Attachments::default(),
            boundary: encoder::make_boundary(),
        }
    }

    /// Set the sender address
    ///
    /// It is also the username used to authenticate.
    pub fn from<S: Into<String>>(mut self, address: S) -> Self {
        self.from = address.into();
        self
    }

    /// Set the human readable sender name, used in the `From` header
    pub fn display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the secret used to authenticate as the sender
    pub fn credential<S: Into<String>>(mut self, secret: S) -> Self {
        self.credential = secret.into();
        self
    }

    /// Set the MIME type of the body
    ///
    /// Defaults to [`DEFAULT_CONTENT_TYPE`].
    pub fn content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set a custom MIME boundary
    ///
    /// A random boundary is generated when the message is created.
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Reads the file at `path` and attaches it under its file name
    ///
    /// The directories leading to the file are not part of the message.
    /// A previous attachment with the same file name is replaced.
    ///
    /// # Errors
    ///
    /// Fails if the path does not name a file or the file can't be read; the
    /// message is left untouched.
    pub fn attach<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let filename = attachment::basename(path).ok_or_else(|| {
            error::io(format!("could not parse attachment filename from {path:?}"))
        })?;
        let content = fs::read(path).map_err(error::io)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("attaching {} ({} bytes)", filename, content.len());

        self.attachments.insert(filename, content);
        Ok(())
    }

    /// Attaches in-memory content
    ///
    /// Only the last component of `filename` is kept, as with [`Message::attach`].
    pub fn attach_content<S, C>(&mut self, filename: S, content: C)
    where
        S: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let filename = filename.as_ref();
        let filename =
            attachment::basename(Path::new(filename)).unwrap_or_else(|| filename.to_owned());
        self.attachments.insert(filename, content.into());
    }

    /// Adds a recipient
    ///
    /// Recipients are declared to the server in the order they were added.
    pub fn add_recipient<S: Into<String>>(&mut self, address: S) {
        self.recipients.push(address.into());
    }

    /// Adds several recipients, keeping their order
    pub fn add_recipients<I>(&mut self, addresses: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.recipients
            .extend(addresses.into_iter().map(Into::into));
    }

    /// Subject of the message
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Body text of the message
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Sender address
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Human readable sender name
    pub fn sender_name(&self) -> &str {
        &self.display_name
    }

    /// Recipients, in declaration order
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Attachments, in insertion order
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Content type the body is sent with
    pub fn effective_content_type(&self) -> &str {
        if self.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            &self.content_type
        }
    }

    /// Builds the SMTP envelope
    ///
    /// # Errors
    ///
    /// If the sender or the recipients are missing.
    pub fn envelope(&self) -> Result<Envelope, Error> {
        Envelope::new(self.from.as_str(), self.recipients.clone())
    }

    /// Credentials used to authenticate as the sender
    ///
    /// # Errors
    ///
    /// If the sender or the credential is missing.
    pub fn credentials(&self) -> Result<Credentials, Error> {
        if self.from.is_empty() {
            return Err(error::configuration(MissingField::From));
        }
        if self.credential.is_empty() {
            return Err(error::configuration(MissingField::Credential));
        }
        Ok(Credentials::new(self.from.clone(), self.credential.clone()))
    }

    /// Get message content formatted for SMTP
    ///
    /// The output only depends on the message fields: formatting the same
    /// message twice gives the same bytes.
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.format(&mut out);
        out
    }

    fn format(&self, out: &mut Vec<u8>) {
        Self::write_header(out, "Subject", &self.subject);
        Self::write_header(out, "MIME-Version", "1.0");
        if !self.display_name.is_empty() {
            let from = format!("{} <{}>", encoder::display_name(&self.display_name), self.from);
            Self::write_header(out, "From", &from);
        }

        if self.attachments.is_empty() {
            self.write_text_part(out);
            return;
        }

        let encoded: Vec<String> = self
            .attachments
            .iter()
            .map(|a| encoder::base64_lines(a.content()))
            .collect();
        let body = encoder::crlf_line_endings(&self.body);
        let boundary = encoder::unique_boundary(
            &self.boundary,
            std::iter::once(body.as_ref()).chain(encoded.iter().map(String::as_str)),
        );

        Self::write_header(
            out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{boundary}\""),
        );
        out.extend_from_slice(b"\r\n");

        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        self.write_text_part(out);
        out.extend_from_slice(b"\r\n");

        for (attachment, encoded) in self.attachments.iter().zip(&encoded) {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            attachment.format_encoded(encoded, out);
        }

        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    }

    fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(encoder::header_value(value).as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    fn write_text_part(&self, out: &mut Vec<u8>) {
        Self::write_header(out, "Content-Type", self.effective_content_type());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(encoder::crlf_line_endings(&self.body).as_bytes());
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("subject", &self.subject)
            .field("from", &self.from)
            .field("display_name", &self.display_name)
            .field("content_type", &self.effective_content_type())
            .field("recipients", &self.recipients)
            .field("attachments", &self.attachments)
            .finish_non_exhaustive()
    }
}
