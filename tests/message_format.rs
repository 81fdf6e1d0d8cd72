use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use mailshot::Message;
use pretty_assertions::assert_eq;

/// Scratch directory removed when dropped
struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> TempDir {
        let path = std::env::temp_dir().join(format!(
            "mailshot-{name}-{}-{}",
            std::process::id(),
            fastrand::u64(..)
        ));
        fs::create_dir_all(&path).unwrap();
        TempDir(path)
    }

    fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.0.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn formatted(message: &Message) -> String {
    String::from_utf8(message.formatted()).unwrap()
}

/// Decoded content of every base64 part, in order
fn decoded_parts(formatted: &str, boundary: &str) -> Vec<Vec<u8>> {
    let delimiter = format!("--{boundary}");
    formatted
        .split(delimiter.as_str())
        .filter(|part| part.contains("Content-Transfer-Encoding: base64"))
        .map(|part| {
            let (_headers, content) = part.split_once("\r\n\r\n").unwrap();
            let content: String = content.split("\r\n").collect();
            STANDARD.decode(content).unwrap()
        })
        .collect()
}

#[test]
fn single_part_has_no_boundary() {
    let message = Message::new("Status", "line one\nline two")
        .from("alice@gmail.com")
        .boundary("never-used-boundary");

    let formatted = formatted(&message);

    assert_eq!(
        formatted,
        concat!(
            "Subject: Status\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "line one\r\nline two",
        )
    );
    assert!(!formatted.contains("never-used-boundary"));
    assert_eq!(formatted.matches("Content-Type:").count(), 1);
}

#[test]
fn attachments_round_trip() {
    let dir = TempDir::new("round-trip");
    let binary: Vec<u8> = (0..=255).cycle().take(3000).collect();
    let files = [
        dir.write("report.pdf", &binary),
        dir.write("empty.bin", b""),
        dir.write("notes/readme.txt", b"read me\r\n"),
    ];

    let mut message = Message::new("Files", "See attached")
        .from("alice@gmail.com")
        .display_name("Alice")
        .boundary("test-boundary-0123456789");
    for file in &files {
        message.attach(file).unwrap();
    }

    let formatted = formatted(&message);

    assert_eq!(
        decoded_parts(&formatted, "test-boundary-0123456789"),
        [binary, Vec::new(), b"read me\r\n".to_vec()]
    );
    assert!(formatted.starts_with(concat!(
        "Subject: Files\r\n",
        "MIME-Version: 1.0\r\n",
        "From: Alice <alice@gmail.com>\r\n",
        "Content-Type: multipart/mixed; boundary=\"test-boundary-0123456789\"\r\n",
        "\r\n",
        "--test-boundary-0123456789\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "See attached\r\n",
    )));
    assert!(formatted.ends_with("--test-boundary-0123456789--\r\n"));
    assert!(formatted.contains("filename=\"report.pdf\""));
    assert!(formatted.contains("filename=\"readme.txt\""));
    assert!(!formatted.contains("filename=\"notes"));
    assert!(formatted.lines().all(|line| line.len() <= 998));
}

#[test]
fn attachments_keep_insertion_order() {
    let mut message = Message::new("Order", "body").boundary("order-boundary");
    message.attach_content("c.txt", "third?");
    message.attach_content("a.txt", "a");
    message.attach_content("b.txt", "b");

    let names: Vec<&str> = message.attachments().iter().map(|a| a.filename()).collect();
    assert_eq!(names, ["c.txt", "a.txt", "b.txt"]);

    let formatted = formatted(&message);
    let positions: Vec<usize> = names
        .iter()
        .map(|name| formatted.find(&format!("filename=\"{name}\"")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn unreadable_attachment_leaves_message_unchanged() {
    let dir = TempDir::new("unreadable");
    let mut message = Message::new("Files", "body");
    message.attach(dir.write("kept.txt", b"kept")).unwrap();
    let before = message.attachments().clone();

    let err = message
        .attach(dir.path().join("does-not-exist.txt"))
        .unwrap_err();
    assert!(err.is_io());
    assert!(!err.is_transport());

    // A directory has a name but no readable content
    fs::create_dir_all(dir.path().join("folder")).unwrap();
    let err = message.attach(dir.path().join("folder")).unwrap_err();
    assert!(err.is_io());

    assert_eq!(message.attachments(), &before);
    assert_eq!(message.attachments().len(), 1);
}

#[test]
fn same_basename_last_write_wins() {
    let dir = TempDir::new("collision");
    let first = dir.write("q1/report.csv", b"first");
    let second = dir.write("q2/report.csv", b"second");

    let mut message = Message::new("Reports", "body").boundary("collision-boundary");
    message.attach(&first).unwrap();
    message.attach(&second).unwrap();

    assert_eq!(message.attachments().len(), 1);
    assert_eq!(
        message.attachments().get("report.csv").unwrap().content(),
        b"second"
    );
    assert_eq!(
        decoded_parts(&formatted(&message), "collision-boundary"),
        [b"second".to_vec()]
    );
}

#[test]
fn formatting_is_repeatable() {
    let mut message = Message::new("Again", "body");
    message.attach_content("a.bin", vec![1, 2, 3]);

    assert_eq!(message.formatted(), message.formatted());
    assert_eq!(message.effective_content_type(), "text/plain; charset=utf-8");
}

#[test]
fn custom_content_type() {
    let message = Message::new("Html", "<p>Hi</p>").content_type("text/html; charset=utf-8");

    assert!(formatted(&message).contains("Content-Type: text/html; charset=utf-8\r\n\r\n<p>Hi</p>"));
}

#[test]
fn boundary_found_in_body_is_changed() {
    let mut message = Message::new("Tricky", "--fixed-boundary\r\nnot a delimiter")
        .boundary("fixed-boundary");
    message.attach_content("a.txt", "a");

    let formatted = formatted(&message);
    let header = formatted
        .lines()
        .find(|line| line.starts_with("Content-Type: multipart/mixed"))
        .unwrap();

    assert_ne!(header, "Content-Type: multipart/mixed; boundary=\"fixed-boundary\"");
    assert!(header.contains("fixed-boundary="));
}
