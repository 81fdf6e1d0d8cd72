use std::time::Duration;

use super::{
    authentication::{Credentials, Mechanism},
    client::{
        net::{Connector, TcpConnector},
        SmtpConnection,
    },
    extension::ClientId,
    response::Response,
    SmtpInfo,
};
use crate::{
    address::Envelope,
    error::{self, Error},
    Transport,
};

/// Sends emails using the SMTP protocol
///
/// Every message is sent over its own connection, encrypted with `STARTTLS`
/// and authenticated before the mail transaction starts.
#[derive(Debug, Clone)]
pub struct SmtpTransport<C = TcpConnector> {
    info: SmtpInfo,
    connector: C,
}

impl<C: Connector> Transport for SmtpTransport<C> {
    type Ok = Response;
    type Error = Error;

    /// Sends an email
    fn send_raw(
        &self,
        envelope: &Envelope,
        credentials: &Credentials,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        let mut conn = self.connection(credentials)?;

        match conn.send(envelope, email) {
            Ok(response) => {
                // The message is accepted at this point
                if let Err(err) = conn.quit() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("ignoring QUIT failure after delivery: {}", err);
                    let _ = err;
                }
                Ok(response)
            }
            Err(err) => {
                conn.abort();
                Err(err)
            }
        }
    }
}

impl SmtpTransport {
    /// Creates a transport with the default settings
    ///
    /// Defaults are:
    ///
    /// * Server `smtp.gmail.com`, port 587
    /// * `STARTTLS` required, certificate checked against the server name
    /// * PLAIN authentication, LOGIN as a fallback
    /// * A 60-seconds timeout for network operations
    pub fn new() -> SmtpTransport {
        Self::builder().build()
    }

    /// Creates a `SmtpTransportBuilder` with the default settings
    pub fn builder() -> SmtpTransportBuilder {
        SmtpTransportBuilder::new()
    }

    /// Creates a transport from connection settings
    pub fn from_info(info: SmtpInfo) -> SmtpTransport {
        SmtpTransport {
            info,
            connector: TcpConnector,
        }
    }
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> SmtpTransport<C> {
    /// Connection settings of this transport
    pub fn info(&self) -> &SmtpInfo {
        &self.info
    }

    /// Tests the SMTP connection
    ///
    /// `test_connection()` tests the connection by using the SMTP NOOP command.
    /// The connection is closed afterward.
    pub fn test_connection(&self) -> Result<bool, Error> {
        let mut conn = self.connect()?;

        let is_connected = conn.test_connected();

        conn.quit()?;

        Ok(is_connected)
    }

    fn connect(&self) -> Result<SmtpConnection<C::Stream>, Error> {
        SmtpConnection::connect(
            &self.connector,
            &self.info.server,
            self.info.port,
            self.info.timeout,
            &self.info.hello_name,
        )
    }

    /// Creates a new connection directly usable to send emails
    ///
    /// Handles encryption and authentication
    fn connection(&self, credentials: &Credentials) -> Result<SmtpConnection<C::Stream>, Error> {
        let mut conn = self.connect()?;

        let secured = conn
            .starttls(&self.info.server, &self.info.hello_name)
            .and_then(|()| {
                conn.auth(&self.info.authentication, credentials)
                    .map_err(error::credentials_rejected)
            });
        if let Err(err) = secured {
            conn.abort();
            return Err(err);
        }

        Ok(conn)
    }
}

/// Contains client configuration.
/// Instances of this struct can be created using [`SmtpTransport::builder`].
#[derive(Debug, Clone)]
pub struct SmtpTransportBuilder<C = TcpConnector> {
    info: SmtpInfo,
    connector: C,
}

impl Default for SmtpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpTransportBuilder {
    // Create new builder with default parameters
    pub(crate) fn new() -> Self {
        Self {
            info: SmtpInfo::default(),
            connector: TcpConnector,
        }
    }
}

/// Builder for the SMTP `SmtpTransport`
impl<C> SmtpTransportBuilder<C> {
    /// Set the server to connect to
    ///
    /// Its TLS certificate must be valid for this name.
    pub fn server<T: Into<String>>(mut self, server: T) -> Self {
        self.info.server = server.into();
        self
    }

    /// Set the port to use
    pub fn port(mut self, port: u16) -> Self {
        self.info.port = port;
        self
    }

    /// Set the name used during EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.info.hello_name = name;
        self
    }

    /// Set the authentication mechanisms to use, by order of preference
    pub fn authentication(mut self, mechanisms: Vec<Mechanism>) -> Self {
        self.info.authentication = mechanisms;
        self
    }

    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.info.timeout = timeout;
        self
    }

    /// Set the network collaborator opening connections
    pub fn connector<D: Connector>(self, connector: D) -> SmtpTransportBuilder<D> {
        SmtpTransportBuilder {
            info: self.info,
            connector,
        }
    }

    /// Build the transport
    pub fn build(self) -> SmtpTransport<C> {
        SmtpTransport {
            info: self.info,
            connector: self.connector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::smtp::client::mock::MockConnector;

    #[test]
    fn builder_defaults() {
        let transport = SmtpTransport::new();

        assert_eq!(transport.info().server, "smtp.gmail.com");
        assert_eq!(transport.info().port, 587);
        assert_eq!(transport.info().timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn builder_overrides() {
        let transport = SmtpTransport::builder()
            .server("smtp.example.com")
            .port(2525)
            .hello_name(ClientId::Domain("me.example.org".to_owned()))
            .authentication(vec![Mechanism::Login])
            .timeout(None)
            .build();

        let info = transport.info();
        assert_eq!(info.server, "smtp.example.com");
        assert_eq!(info.port, 2525);
        assert_eq!(info.hello_name, ClientId::Domain("me.example.org".to_owned()));
        assert_eq!(info.authentication, [Mechanism::Login]);
        assert_eq!(info.timeout, None);
    }

    #[test]
    fn from_info_keeps_settings() {
        let info = SmtpInfo {
            server: "smtp.example.com".to_owned(),
            port: 2587,
            ..SmtpInfo::default()
        };

        let transport = SmtpTransport::from_info(info.clone());
        assert_eq!(transport.info(), &info);
    }

    #[test]
    fn test_connection_uses_noop() {
        let connector = MockConnector::new([
            "220 smtp.example.com ESMTP",
            "250 smtp.example.com",
            "250 2.0.0 OK",
            "221 2.0.0 closing connection",
        ]);
        let transport = SmtpTransport::builder()
            .server("smtp.example.com")
            .hello_name(ClientId::Domain("me".to_owned()))
            .connector(connector.clone())
            .build();

        assert!(transport.test_connection().unwrap());
        assert_eq!(connector.written(), "EHLO me\r\nNOOP\r\nQUIT\r\n");
        assert_eq!(connector.server(), Some(("smtp.example.com".to_owned(), 587)));
    }

    #[test]
    fn unreachable_server() {
        let connector = MockConnector::new(Vec::<String>::new()).refuse_connection();
        let transport = SmtpTransport::builder().connector(connector).build();

        let err = transport.test_connection().unwrap_err();
        assert!(err.is_transport());
    }
}
