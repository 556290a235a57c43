//! Minimal echo agent — accepts one controller connection and answers
//! ECHO_SERVICE requests.
//!
//! Run with:
//!   cargo run --example echo-agent
//!
//! In another terminal:
//!   cargo run -- send --data "Is there anybody out there?"

use agentwire::codec::{
    EntityClass, MessageClass, MessageDecoder, MessageEncoder, TlvType, TlvValue,
};
use agentwire::net::{message_buffer, Endpoint};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut io = Endpoint::new();
    io.open_listening()?;
    eprintln!("Listening on port {}", io.local_port().unwrap_or(0));

    let read_buffer = message_buffer();
    let write_buffer = message_buffer();

    loop {
        if !io.poll()? {
            continue;
        }

        let frame = io.read_message(&read_buffer)?;
        if frame.is_empty() {
            eprintln!("Peer disconnected");
            continue;
        }

        let mut decoder = MessageDecoder::new(frame)?;
        if !decoder.is_request()
            || decoder.header().entity_class() != EntityClass::ECHO_SERVICE
        {
            eprintln!("Ignoring {}", decoder.header().message_class());
            continue;
        }

        let request = decoder.get(TlvType::BinaryData)?;
        let text = request.as_text().unwrap_or_default();
        eprintln!("Received: {text}");

        let mut encoder = MessageEncoder::new(write_buffer.clone())?;
        encoder
            .header()
            .message_class(MessageClass::ResponseSuccess)
            .entity_class(EntityClass::ECHO_SERVICE);
        encoder.add(&TlvValue::binary_text(&format!("{text} Here I am!")))?;
        encoder.end()?;

        io.write_message(&encoder.data()?.into())?;
    }
}
