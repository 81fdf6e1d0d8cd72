//! SMTP commands

use std::fmt::{self, Display, Formatter};

use crate::{
    base64,
    error::{self, Error},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        extension::{ClientId, MailParameter},
        response::Response,
    },
};

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates a EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: String,
    parameters: Vec<MailParameter>,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>", self.sender)?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

impl Mail {
    /// Creates a MAIL command
    pub fn new(sender: String, parameters: Vec<MailParameter>) -> Mail {
        Mail { sender, parameters }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: String,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl Rcpt {
    /// Creates an RCPT command
    pub fn new(recipient: String) -> Rcpt {
        Rcpt { recipient }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// NOOP command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Noop;

impl Display for Noop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("NOOP\r\n")
    }
}

/// AUTH command
///
/// Displays the encoded credentials: never log it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    mechanism: Mechanism,
    response: Option<String>,
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let encoded_response = self.response.as_ref().map(base64::encode);

        match (self.mechanism.supports_initial_response(), encoded_response) {
            (true, Some(response)) => write!(f, "AUTH {} {}", self.mechanism, response)?,
            (false, Some(response)) => f.write_str(&response)?,
            (_, None) => write!(f, "AUTH {}", self.mechanism)?,
        }
        f.write_str("\r\n")
    }
}

impl Auth {
    /// Creates an AUTH command (from a challenge if provided)
    pub fn new(
        mechanism: Mechanism,
        credentials: &Credentials,
        challenge: Option<&str>,
    ) -> Result<Auth, Error> {
        let response = if mechanism.supports_initial_response() || challenge.is_some() {
            Some(mechanism.response(credentials, challenge)?)
        } else {
            None
        };
        Ok(Auth {
            mechanism,
            response,
        })
    }

    /// Creates an AUTH command from a response that needs to be a
    /// valid challenge (with 334 response code)
    pub fn new_from_response(
        mechanism: Mechanism,
        credentials: &Credentials,
        response: &Response,
    ) -> Result<Auth, Error> {
        if !response.has_code(334) {
            return Err(error::response("Expecting a challenge"));
        }

        let encoded_challenge = response
            .first_word()
            .ok_or_else(|| error::response("Could not read auth challenge"))?;
        #[cfg(feature = "tracing")]
        tracing::debug!("auth encoded challenge: {}", encoded_challenge);

        let decoded_base64 = base64::decode(encoded_challenge).map_err(error::response)?;
        let decoded_challenge = String::from_utf8(decoded_base64).map_err(error::response)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("auth decoded challenge: {}", decoded_challenge);

        Self::new(mechanism, credentials, Some(&decoded_challenge))
    }

    /// Line to log in place of the command
    pub(crate) fn redacted(&self) -> String {
        format!("AUTH {} ***", self.mechanism)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::{
        extension::MailBodyParameter,
        response::{Code, Response},
    };

    #[test]
    fn test_display() {
        let id = ClientId::Domain("localhost".to_owned());
        let email = "test@example.com".to_owned();
        assert_eq!(format!("{}", Ehlo::new(id)), "EHLO localhost\r\n");
        assert_eq!(
            format!("{}", Mail::new(email.clone(), vec![])),
            "MAIL FROM:<test@example.com>\r\n"
        );
        assert_eq!(
            format!(
                "{}",
                Mail::new(
                    email.clone(),
                    vec![
                        MailParameter::Body(MailBodyParameter::EightBitMime),
                        MailParameter::SmtpUtfEight,
                    ],
                )
            ),
            "MAIL FROM:<test@example.com> BODY=8BITMIME SMTPUTF8\r\n"
        );
        assert_eq!(
            format!("{}", Rcpt::new(email)),
            "RCPT TO:<test@example.com>\r\n"
        );
        assert_eq!(format!("{}", Starttls), "STARTTLS\r\n");
        assert_eq!(format!("{}", Quit), "QUIT\r\n");
        assert_eq!(format!("{}", Data), "DATA\r\n");
        assert_eq!(format!("{}", Noop), "NOOP\r\n");
    }

    #[test]
    fn test_auth_display() {
        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        assert_eq!(
            format!("{}", Auth::new(Mechanism::Plain, &credentials, None).unwrap()),
            "AUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\n"
        );
        assert_eq!(
            format!("{}", Auth::new(Mechanism::Login, &credentials, None).unwrap()),
            "AUTH LOGIN\r\n"
        );
    }

    #[test]
    fn test_auth_login_challenges() {
        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        let username = Response::new(Code::new(334).unwrap(), vec!["VXNlcm5hbWU6".to_owned()]);
        let password = Response::new(Code::new(334).unwrap(), vec!["UGFzc3dvcmQ6".to_owned()]);

        assert_eq!(
            format!(
                "{}",
                Auth::new_from_response(Mechanism::Login, &credentials, &username).unwrap()
            ),
            "dXNlcg==\r\n"
        );
        assert_eq!(
            format!(
                "{}",
                Auth::new_from_response(Mechanism::Login, &credentials, &password).unwrap()
            ),
            "cGFzc3dvcmQ=\r\n"
        );

        let not_a_challenge = Response::new(Code::new(250).unwrap(), vec!["OK".to_owned()]);
        assert!(Auth::new_from_response(Mechanism::Login, &credentials, &not_a_challenge).is_err());
    }

    #[test]
    fn test_auth_redacted() {
        let credentials = Credentials::new("user".to_owned(), "password".to_owned());
        let auth = Auth::new(Mechanism::Plain, &credentials, None).unwrap();
        assert_eq!(auth.redacted(), "AUTH PLAIN ***");
    }
}
