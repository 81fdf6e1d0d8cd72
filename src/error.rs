//! Error and result type for composing and sending messages

use std::{error::Error as StdError, fmt, io};

use crate::{
    transport::smtp::response::{Code, Severity},
    BoxError,
};

/// Reply text Gmail uses when the session is not (or no longer) authenticated
const AUTHENTICATION_REQUIRED: &str = "530 5.5.1";

/// The errors that may occur while building or sending a message
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

/// Message field that must be set before sending
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MissingField {
    /// Sender address, set with [`Message::from`](crate::Message::from)
    From,
    /// At least one recipient, added with
    /// [`Message::add_recipient`](crate::Message::add_recipient)
    Recipients,
    /// Authentication secret, set with
    /// [`Message::credential`](crate::Message::credential)
    Credential,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingField::From => "no sender specified",
            MissingField::Recipients => "no recipient specified",
            MissingField::Credential => "no credential specified",
        })
    }
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if a required message field was missing
    ///
    /// These errors are raised before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(self.inner.kind, Kind::Configuration(_))
    }

    /// Returns the field that was missing, for configuration errors
    pub fn missing_field(&self) -> Option<MissingField> {
        match self.inner.kind {
            Kind::Configuration(field) => Some(field),
            _ => None,
        }
    }

    /// Returns true if a local file could not be read
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io)
    }

    /// Returns true if the server rejected the credentials
    pub fn is_authentication(&self) -> bool {
        matches!(self.inner.kind, Kind::Authentication)
    }

    /// Returns true for every other network or protocol failure
    pub fn is_transport(&self) -> bool {
        !matches!(
            self.inner.kind,
            Kind::Configuration(_) | Kind::Io | Kind::Authentication
        )
    }

    /// Returns true if the error is a transient SMTP error
    pub fn is_transient(&self) -> bool {
        matches!(self.inner.kind, Kind::Transient(_))
    }

    /// Returns true if the error is a permanent SMTP error
    pub fn is_permanent(&self) -> bool {
        matches!(self.inner.kind, Kind::Permanent(_))
    }

    /// Returns true if the error is from the TLS upgrade
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                return io_err.kind() == io::ErrorKind::TimedOut;
            }

            source = err.source();
        }

        false
    }

    /// Returns the status code, if the error was generated from a response
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Transient(code) | Kind::Permanent(code) => Some(code),
            Kind::Authentication => self
                .inner
                .source
                .as_ref()
                .and_then(|source| source.downcast_ref::<Error>())
                .and_then(Error::status),
            _ => None,
        }
    }

    /// Text of the negative reply, without its code
    fn reply_text(&self) -> Option<String> {
        match self.inner.kind {
            Kind::Transient(_) | Kind::Permanent(_) => {
                self.inner.source.as_ref().map(ToString::to_string)
            }
            _ => None,
        }
    }

    /// Checks for Gmail's "530 5.5.1 Authentication Required" reply
    ///
    /// Uses the reply code and enhanced status code when available, and
    /// falls back to searching the error text otherwise.
    fn is_authentication_required(&self) -> bool {
        match self.status() {
            Some(code) => {
                u16::from(code) == 530
                    && self
                        .reply_text()
                        .is_some_and(|text| text.starts_with("5.5.1"))
            }
            None => self.to_string().contains(AUTHENTICATION_REQUIRED),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Required message field is empty
    Configuration(MissingField),
    /// Local file access failed
    Io,
    /// Credentials rejected by the server
    Authentication,
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Transient(Code),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Permanent(Code),
    /// Error parsing a response
    Response,
    /// Internal client error
    Client,
    /// Connection error
    Connection,
    /// Underlying network i/o error
    Network,
    /// TLS error
    Tls,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("mailshot::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Configuration(ref field) => write!(f, "configuration error: {field}")?,
            Kind::Io => f.write_str("i/o error")?,
            Kind::Authentication => {
                f.write_str("authentication failure, the username or password is incorrect")?
            }
            Kind::Response => f.write_str("response error")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Connection => f.write_str("connection error")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Transient(ref code) => write!(f, "transient error ({code})")?,
            Kind::Permanent(ref code) => write!(f, "permanent error ({code})")?,
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn configuration(field: MissingField) -> Error {
    Error::new(Kind::Configuration(field), None::<BoxError>)
}

pub(crate) fn io<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Io, Some(e))
}

pub(crate) fn code(c: Code, s: Option<String>) -> Error {
    match c.severity() {
        Severity::TransientNegativeCompletion => Error::new(Kind::Transient(c), s),
        Severity::PermanentNegativeCompletion => Error::new(Kind::Permanent(c), s),
        _ => client("Unknown error code"),
    }
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

/// Classifies a failed `AUTH` exchange
///
/// 535 is the RFC 4954 reply for invalid credentials.
pub(crate) fn credentials_rejected(err: Error) -> Error {
    let invalid_credentials = err.status().is_some_and(|code| u16::from(code) == 535);
    if invalid_credentials || err.is_authentication_required() {
        Error::new(Kind::Authentication, Some(err))
    } else {
        err
    }
}

/// Classifies a failed `MAIL FROM`
///
/// Gmail reports a session with bad credentials at this step rather than
/// during `AUTH`.
pub(crate) fn sender_rejected(err: Error) -> Error {
    if err.is_authentication_required() {
        Error::new(Kind::Authentication, Some(err))
    } else {
        err
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn permanent(value: u16, text: &str) -> Error {
        code(Code::new(value).unwrap(), Some(text.to_owned()))
    }

    #[test]
    fn missing_field_is_configuration() {
        let err = configuration(MissingField::Credential);

        assert!(err.is_configuration());
        assert!(!err.is_transport());
        assert_eq!(err.missing_field(), Some(MissingField::Credential));
        assert_eq!(
            err.to_string(),
            "configuration error: no credential specified"
        );
    }

    #[test]
    fn sender_rejected_with_authentication_required() {
        let err = sender_rejected(permanent(530, "5.5.1 Authentication Required."));

        assert!(err.is_authentication());
        assert!(!err.is_transport());
        assert_eq!(err.status().map(u16::from), Some(530));
    }

    #[test]
    fn sender_rejected_for_other_reasons() {
        let err = sender_rejected(permanent(553, "5.1.2 Invalid sender address"));
        assert!(err.is_transport());
        assert!(err.is_permanent());

        let err = sender_rejected(permanent(530, "5.7.0 Must issue a STARTTLS command first."));
        assert!(err.is_transport());
    }

    #[test]
    fn sender_rejected_falls_back_to_text() {
        let err = sender_rejected(response("unexpected reply: 530 5.5.1 Authentication"));
        assert!(err.is_authentication());

        let err = sender_rejected(network("connection reset"));
        assert!(err.is_transport());
    }

    #[test]
    fn credentials_rejected_classification() {
        let err = credentials_rejected(permanent(535, "5.7.8 Username and Password not accepted."));
        assert!(err.is_authentication());

        let err = credentials_rejected(permanent(454, "4.7.0 Too many login attempts"));
        assert!(err.is_transport());
        assert!(err.is_transient());
    }

    #[test]
    fn display_includes_source() {
        let err = permanent(550, "5.1.1 No such user");
        assert_eq!(err.to_string(), "permanent error (550): 5.1.1 No such user");
    }
}
