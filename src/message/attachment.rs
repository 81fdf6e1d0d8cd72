use std::path::Path;

use crate::message::encoder;

/// A file attached to a message
///
/// Only the file name is kept, never the directory it was read from.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content: Vec<u8>,
}

impl Attachment {
    /// Name announced in the `Content-Disposition` header
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Raw content, before transfer encoding
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Writes the part headers and `encoded` content, without delimiter
    pub(crate) fn format_encoded(&self, encoded: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n");
        out.extend_from_slice(b"Content-Disposition: attachment; filename=");
        out.extend_from_slice(encoder::quoted_string(&self.filename).as_bytes());
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(encoded.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("len", &self.content.len())
            .finish()
    }
}

/// Attachments of a message, in insertion order
///
/// File names are unique: attaching a second file with the same name
/// replaces the content of the first one, which keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    entries: Vec<Attachment>,
}

impl Attachments {
    /// Adds an attachment, returning the content it replaced, if any
    pub(crate) fn insert(&mut self, filename: String, content: Vec<u8>) -> Option<Vec<u8>> {
        match self.entries.iter_mut().find(|a| a.filename == filename) {
            Some(existing) => Some(std::mem::replace(&mut existing.content, content)),
            None => {
                self.entries.push(Attachment { filename, content });
                None
            }
        }
    }

    /// Looks up an attachment by file name
    pub fn get(&self, filename: &str) -> Option<&Attachment> {
        self.entries.iter().find(|a| a.filename == filename)
    }

    /// Number of attachments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attachments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the attachments in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Attachment> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Attachments {
    type Item = &'a Attachment;
    type IntoIter = std::slice::Iter<'a, Attachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Last component of `path`, if it names a file
pub(crate) fn basename(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
