use crate::error::{self, Error, MissingField};

/// Simple email envelope representation
///
/// The envelope is what the SMTP server sees in `MAIL FROM` and `RCPT TO`,
/// independently of the message headers.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    /// The envelope recipients' addresses, in declaration order
    ///
    /// This can not be empty.
    forward_path: Vec<String>,
    /// The envelope sender address
    reverse_path: String,
}

impl Envelope {
    /// Creates a new envelope
    ///
    /// # Examples
    ///
    /// ```
    /// # use mailshot::Envelope;
    /// # fn main() -> Result<(), mailshot::Error> {
    /// let envelope = Envelope::new("from@email.com", vec!["to@email.com".to_owned()])?;
    /// assert_eq!(envelope.from(), "from@email.com");
    /// assert_eq!(envelope.to(), ["to@email.com"]);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// If `from` is empty or `to` has no elements in it.
    pub fn new<S: Into<String>>(from: S, to: Vec<String>) -> Result<Envelope, Error> {
        let from = from.into();
        if from.is_empty() {
            return Err(error::configuration(MissingField::From));
        }
        if to.is_empty() {
            return Err(error::configuration(MissingField::Recipients));
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from,
        })
    }

    /// Gets the destination addresses of the envelope
    pub fn to(&self) -> &[String] {
        self.forward_path.as_slice()
    }

    /// Gets the sender of the envelope
    pub fn from(&self) -> &str {
        &self.reverse_path
    }

    /// Check if any of the addresses in the envelope contains non-ascii chars
    pub(crate) fn has_non_ascii_addresses(&self) -> bool {
        !self.reverse_path.is_ascii() || self.forward_path.iter().any(|a| !a.is_ascii())
    }
}
