use std::thread;
use std::time::Duration;

use agentwire_buffer::Ipv4Address;
use agentwire_codec::{
    EntityClass, MessageClass, MessageDecoder, MessageEncoder, TlvType, TlvValue,
};
use agentwire_net::{message_buffer, Endpoint};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{
    codec_error, net_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let address: Ipv4Address = args
        .address
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("bad --address: {err}")))?;

    let mut io = Endpoint::new().with_address(address).with_port(args.port);

    let mut attempt = 0;
    loop {
        let connected = io
            .open_client()
            .map_err(|err| net_error("connect failed", err))?;
        if connected {
            break;
        }
        attempt += 1;
        if attempt > args.retries {
            return Err(CliError::new(
                TIMEOUT,
                format!(
                    "could not connect to {address}:{} after {} attempts",
                    args.port,
                    attempt
                ),
            ));
        }
        debug!(attempt, "connection refused, retrying");
        thread::sleep(Duration::from_millis(args.delay_ms));
    }

    let buffer = message_buffer();
    let mut encoder = MessageEncoder::new(buffer.clone())
        .map_err(|err| codec_error("encode failed", err))?;
    encoder
        .header()
        .message_class(MessageClass::RequestGet)
        .entity_class(EntityClass::ECHO_SERVICE);
    encoder
        .add(&TlvValue::binary_text(&args.data))
        .map_err(|err| codec_error("encode failed", err))?;
    encoder.end().map_err(|err| codec_error("encode failed", err))?;

    print_message(
        "request",
        MessageClass::RequestGet,
        EntityClass::ECHO_SERVICE,
        &args.data,
        format,
    );

    let data = encoder
        .data()
        .map_err(|err| codec_error("encode failed", err))?;
    io.write_message(&data)
        .map_err(|err| net_error("write failed", err))?;

    let reply = io
        .read_message(&buffer)
        .map_err(|err| net_error("read failed", err))?;
    if reply.is_empty() {
        return Err(CliError::new(
            FAILURE,
            "connection closed before a reply arrived",
        ));
    }

    let mut decoder =
        MessageDecoder::new(reply).map_err(|err| codec_error("bad reply", err))?;
    let class = decoder.header().message_class();
    let entity = decoder.header().entity_class();

    if decoder.is_success() {
        let tlv = decoder
            .get(TlvType::BinaryData)
            .map_err(|err| codec_error("bad reply", err))?;
        print_message(
            "reply",
            class,
            entity,
            &tlv.as_text().unwrap_or_default(),
            format,
        );
        Ok(SUCCESS)
    } else if decoder.is_failure() {
        let tlv = decoder
            .get(TlvType::Error)
            .map_err(|err| codec_error("bad reply", err))?;
        match tlv {
            TlvValue::Error { errcode, message } => Err(CliError::new(
                FAILURE,
                format!("agent reported error {errcode}: {message}"),
            )),
            _ => Err(CliError::new(DATA_INVALID, "malformed failure reply")),
        }
    } else {
        Err(CliError::new(
            DATA_INVALID,
            format!("unexpected reply message class {class}"),
        ))
    }
}
