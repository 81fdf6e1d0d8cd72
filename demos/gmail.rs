use std::{env, process};

use mailshot::{Message, SmtpTransport, Transport};

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let (Some(from), Some(credential), Some(to)) = (args.next(), args.next(), args.next()) else {
        println!("Usage: gmail <from> <app password> <recipient> [attachment...]");
        process::exit(1);
    };

    let mut email = Message::new("Happy new year", "Be happy!")
        .from(from)
        .display_name("NoBody")
        .credential(credential);
    email.add_recipient(to);
    for path in args {
        if let Err(e) = email.attach(&path) {
            println!("Could not attach {path}: {e}");
            process::exit(1);
        }
    }

    // Open a remote connection to gmail using STARTTLS
    let mailer = SmtpTransport::new();

    // Send the email
    match mailer.send(&email) {
        Ok(_) => println!("Email sent successfully!"),
        Err(e) if e.is_authentication() => {
            println!("Gmail rejected the credentials, check the app password: {e}")
        }
        Err(e) => panic!("Could not send email: {e:?}"),
    }
}
