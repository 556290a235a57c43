use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentwire_buffer::{BufferView, BufferWritableView, Ipv4Address};
use agentwire_codec::{
    EntityClass, MessageClass, MessageDecoder, MessageEncoder, TlvType, TlvValue,
};
use agentwire_net::{message_buffer, Endpoint};
use tracing::{debug, info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{codec_error, net_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let address: Ipv4Address = args
        .address
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("bad --address: {err}")))?;

    let mut io = Endpoint::new()
        .with_address(address)
        .with_port(args.port)
        .with_delay(Duration::from_millis(args.delay_ms));
    io.open_listening()
        .map_err(|err| net_error("bind failed", err))?;
    info!(
        port = io.local_port().unwrap_or(args.port),
        "echo agent listening"
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let read_buffer = message_buffer();
    let write_buffer = message_buffer();
    let mut served = 0usize;

    while running.load(Ordering::SeqCst) {
        let data_ready = io.poll().map_err(|err| net_error("poll failed", err))?;
        if !data_ready {
            continue;
        }

        let frame = io
            .read_message(&read_buffer)
            .map_err(|err| net_error("read failed", err))?;
        if frame.is_empty() {
            // Peer went away or an alien-version frame was skipped;
            // the next poll() accepts a new connection if needed.
            continue;
        }

        match answer(&mut io, frame, &write_buffer, format) {
            Ok(true) => {
                served += 1;
                if args.count.is_some_and(|count| served >= count) {
                    return Ok(SUCCESS);
                }
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "failed to answer request"),
        }
    }

    Ok(SUCCESS)
}

/// Decode one frame and send the matching reply.
///
/// Returns true when a reply went out.
fn answer(
    io: &mut Endpoint,
    frame: BufferView,
    write_buffer: &BufferWritableView,
    format: OutputFormat,
) -> CliResult<bool> {
    let mut decoder =
        MessageDecoder::new(frame).map_err(|err| codec_error("decode failed", err))?;

    if !decoder.is_request() {
        debug!(
            class = %decoder.header().message_class(),
            "ignoring non-request message"
        );
        return Ok(false);
    }

    let entity = decoder.header().entity_class();
    let transaction_id = decoder.header().transaction_id();

    let mut encoder = MessageEncoder::new(write_buffer.clone())
        .map_err(|err| codec_error("encode failed", err))?;

    if entity == EntityClass::ECHO_SERVICE {
        let tlv = decoder
            .get(TlvType::BinaryData)
            .map_err(|err| codec_error("bad echo request", err))?;
        let text = tlv.as_text().unwrap_or_default();
        print_message(
            "request",
            decoder.header().message_class(),
            entity,
            &text,
            format,
        );

        let reply = format!("{text} Here I am!");
        encoder
            .header()
            .message_class(MessageClass::ResponseSuccess)
            .entity_class(entity)
            .transaction_id(transaction_id);
        encoder
            .add(&TlvValue::binary_text(&reply))
            .map_err(|err| codec_error("encode failed", err))?;
        encoder.end().map_err(|err| codec_error("encode failed", err))?;

        print_message("reply", MessageClass::ResponseSuccess, entity, &reply, format);
    } else {
        debug!(%entity, "unsupported entity class");
        encoder
            .header()
            .message_class(MessageClass::ResponseFailure)
            .entity_class(entity)
            .transaction_id(transaction_id);
        encoder
            .add(&TlvValue::Error {
                errcode: 1,
                message: format!("unsupported entity class {entity}"),
            })
            .map_err(|err| codec_error("encode failed", err))?;
        encoder.end().map_err(|err| codec_error("encode failed", err))?;
    }

    let data = encoder
        .data()
        .map_err(|err| codec_error("encode failed", err))?;
    io.write_message(&data)
        .map_err(|err| net_error("write failed", err))?;
    Ok(true)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
