//! Message encoder and decoder state machines.
//!
//! An encoder owns a writable frame view and a cursor that starts
//! past the common header; each `add` encodes one TLV value behind a
//! reserved 4-byte TLV header and advances the cursor, and `end`
//! finalizes the preamble's length field. A decoder walks the same
//! structure, validating each TLV's declared type and length against
//! what the caller expects.

use agentwire_buffer::{BufferView, BufferWritableView};

use crate::error::{CodecError, Result};
use crate::header::{CommonHeaderDecoder, CommonHeaderEncoder, MessageClass, HEADER_LEN};
use crate::tlv::{TlvType, TlvValue};

/// Size of the TLV header: 2-byte type plus 2-byte total length.
pub const TLV_HEADER_LEN: usize = 4;

const TYPE_OFFSET: usize = 0;
const LENGTH_OFFSET: usize = 2;

/// Assembles a common header plus a sequence of TLVs into a writable
/// view.
#[derive(Debug)]
pub struct MessageEncoder {
    buffer: BufferWritableView,
    header: CommonHeaderEncoder,
    cursor: usize,
    closed: bool,
}

impl MessageEncoder {
    /// Start a message in `buffer`, writing the default header.
    pub fn new(buffer: BufferWritableView) -> Result<MessageEncoder> {
        let header = CommonHeaderEncoder::new(buffer.clone())?;
        Ok(MessageEncoder {
            buffer,
            header,
            cursor: HEADER_LEN,
            closed: false,
        })
    }

    /// The common-header encoder for this message.
    pub fn header(&mut self) -> &mut CommonHeaderEncoder {
        &mut self.header
    }

    /// Append one TLV, encoding its value behind a TLV header.
    pub fn add(&mut self, tlv: &TlvValue) -> Result<&mut Self> {
        if self.closed {
            return Err(CodecError::InvalidArgument(
                "message already finalized by end()".into(),
            ));
        }

        let remaining = self.buffer.len().saturating_sub(self.cursor);
        if remaining < TLV_HEADER_LEN {
            return Err(CodecError::BufferTooSmall {
                required: TLV_HEADER_LEN + tlv.encoded_len(),
                available: remaining,
            });
        }

        let tl = self.buffer.sub_from(self.cursor)?;
        let value_len = tlv.encode(&tl.sub_from(TLV_HEADER_LEN)?)?;
        let total_len = TLV_HEADER_LEN + value_len;
        let wire_len = u16::try_from(total_len).map_err(|_| {
            CodecError::InvalidArgument(format!("TLV length {total_len} exceeds the 16-bit field"))
        })?;

        tl.set_u16(TYPE_OFFSET, tlv.tlv_type().wire_value())?
            .set_u16(LENGTH_OFFSET, wire_len)?;

        self.cursor += total_len;
        Ok(self)
    }

    /// Finalize: write the total length into the preamble and close.
    pub fn end(&mut self) -> Result<()> {
        if self.closed {
            return Err(CodecError::InvalidArgument(
                "message already finalized by end()".into(),
            ));
        }
        let total = u32::try_from(self.cursor).map_err(|_| {
            CodecError::InvalidArgument(format!(
                "frame length {} exceeds the 32-bit length field",
                self.cursor
            ))
        })?;
        self.header.total_length(total);
        self.closed = true;
        Ok(())
    }

    /// The populated prefix of the backing view.
    pub fn data(&self) -> Result<BufferWritableView> {
        Ok(self.buffer.sub(0, self.cursor)?)
    }
}

/// Walks the TLV sequence of a received frame.
pub struct MessageDecoder {
    buffer: BufferView,
    header: CommonHeaderDecoder,
    cursor: usize,
}

impl MessageDecoder {
    /// Attach to a complete frame view.
    pub fn new(buffer: BufferView) -> Result<MessageDecoder> {
        let header = CommonHeaderDecoder::new(buffer.clone())?;
        Ok(MessageDecoder {
            buffer,
            header,
            cursor: HEADER_LEN,
        })
    }

    /// The common-header decoder for this message.
    pub fn header(&self) -> &CommonHeaderDecoder {
        &self.header
    }

    pub fn is_request(&self) -> bool {
        self.header.message_class().is_request()
    }

    pub fn is_success(&self) -> bool {
        self.header.message_class() == MessageClass::ResponseSuccess
    }

    pub fn is_failure(&self) -> bool {
        self.header.message_class() == MessageClass::ResponseFailure
    }

    /// Decode the next TLV, which must be of the `expected` type.
    pub fn get(&mut self, expected: TlvType) -> Result<TlvValue> {
        let tl = self.buffer.sub(self.cursor, TLV_HEADER_LEN)?;
        let wire_type = tl.get_u16_unchecked(TYPE_OFFSET);
        let total_len = tl.get_u16_unchecked(LENGTH_OFFSET) as usize;

        if wire_type != expected.wire_value() {
            return Err(CodecError::TypeMismatch {
                expected,
                found: wire_type,
            });
        }
        if total_len < TLV_HEADER_LEN {
            return Err(CodecError::Malformed(format!(
                "TLV declares total length {total_len}, below the {TLV_HEADER_LEN}-byte header"
            )));
        }

        let value_view = self
            .buffer
            .sub(self.cursor + TLV_HEADER_LEN, total_len - TLV_HEADER_LEN)?;
        let value = TlvValue::decode(expected, &value_view)?;

        // TlvValue::decode consumed exactly value_view.len() bytes, so
        // the declared total length is accounted for; advance past it.
        self.cursor += total_len;
        Ok(value)
    }

    /// Peek the next TLV's type without advancing.
    ///
    /// Returns `None` (the reserved type) when fewer than 4 header
    /// bytes remain, when the declared length would overrun the
    /// frame, or when the wire type is unregistered.
    pub fn next_type(&self) -> TlvType {
        if self.cursor + TLV_HEADER_LEN > self.buffer.len() {
            return TlvType::None;
        }
        let wire_type = self.buffer.get_u16_unchecked(self.cursor + TYPE_OFFSET);
        let total_len = self.buffer.get_u16_unchecked(self.cursor + LENGTH_OFFSET) as usize;
        if self.cursor + total_len > self.buffer.len() {
            return TlvType::None;
        }
        TlvType::from_wire(wire_type).unwrap_or(TlvType::None)
    }
}

#[cfg(test)]
mod tests {
    use agentwire_buffer::{BufferWritableView, Region};
    use bytes::Bytes;

    use super::*;
    use crate::header::EntityClass;

    fn frame_buffer() -> BufferWritableView {
        BufferWritableView::new(Region::with_capacity(4096))
    }

    #[test]
    fn echo_get_request_is_byte_exact() {
        // An ECHO GET request carrying BINARY_DATA
        // "Is there anybody out there?" (28 bytes with the NUL).
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder
            .header()
            .message_class(MessageClass::RequestGet)
            .entity_class(EntityClass::ECHO_SERVICE);
        encoder
            .add(&TlvValue::binary_text("Is there anybody out there?"))
            .unwrap();
        encoder.end().unwrap();

        let data = encoder.data().unwrap();
        assert_eq!(data.len(), 24 + 4 + 28);

        let bytes = data.to_vec();
        assert_eq!(
            &bytes[..8],
            [0x02, 0x00, 0xC0, 0xFF, 0x00, 0x00, 0x00, 0x38]
        );
        // TLV header: BINARY_DATA (4), total length 32.
        assert_eq!(&bytes[24..28], [0x00, 0x04, 0x00, 0x20]);
    }

    #[test]
    fn echo_get_request_decodes() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder
            .header()
            .message_class(MessageClass::RequestGet)
            .entity_class(EntityClass::ECHO_SERVICE);
        encoder
            .add(&TlvValue::binary_text("Is there anybody out there?"))
            .unwrap();
        encoder.end().unwrap();

        let mut decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
        assert_eq!(decoder.header().message_class(), MessageClass::RequestGet);
        assert_eq!(decoder.header().entity_class(), EntityClass::ECHO_SERVICE);
        assert!(decoder.is_request());
        assert_eq!(decoder.next_type(), TlvType::BinaryData);

        let tlv = decoder.get(TlvType::BinaryData).unwrap();
        assert_eq!(tlv.as_text().unwrap(), "Is there anybody out there?");
        assert_eq!(decoder.next_type(), TlvType::None);
    }

    #[test]
    fn failure_response_with_error_tlv_is_byte_exact() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder
            .header()
            .message_class(MessageClass::ResponseFailure)
            .entity_class(EntityClass::ECHO_SERVICE);
        encoder
            .add(&TlvValue::Error {
                errcode: 42,
                message: "12345".into(),
            })
            .unwrap();
        encoder.end().unwrap();

        let data = encoder.data().unwrap();
        assert_eq!(data.len(), 36);

        let bytes = data.to_vec();
        // Response flag set, outcome bit 15 set (FAILURE).
        assert_eq!(bytes[1] & 0x80, 0x80);
        assert_eq!(bytes[2] & 0xC0, 0x80);
        assert_eq!(
            &bytes[24..36],
            [0x00, 0x01, 0x00, 0x0C, 0x00, 0x2A, b'1', b'2', b'3', b'4', b'5', 0x00]
        );

        let mut decoder = MessageDecoder::new(data.as_view()).unwrap();
        assert!(decoder.is_failure());
        assert!(!decoder.is_success());
        assert!(!decoder.is_request());
        let tlv = decoder.get(TlvType::Error).unwrap();
        assert_eq!(
            tlv,
            TlvValue::Error {
                errcode: 42,
                message: "12345".into(),
            }
        );
    }

    #[test]
    fn length_field_matches_bytes_written() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::RequestAdd);
        encoder
            .add(&TlvValue::Periodicity { milliseconds: 500 })
            .unwrap()
            .add(&TlvValue::UeMeasurementId {
                rnti: 0x4601,
                meas_id: 1,
            })
            .unwrap();
        encoder.end().unwrap();

        let data = encoder.data().unwrap();
        assert_eq!(data.get_u32(4).unwrap() as usize, data.len());
        assert_eq!(data.len(), 24 + (4 + 4) + (4 + 3));
    }

    #[test]
    fn every_tlv_roundtrips_with_header_state() {
        let values = [
            TlvValue::Error {
                errcode: 7,
                message: "degraded".into(),
            },
            TlvValue::KeyValueStringPairs(vec![("k".into(), "v".into())]),
            TlvValue::ListOfTlv {
                inner_type: TlvType::UeReport,
                count: 2,
            },
            TlvValue::BinaryData(Bytes::from_static(b"\x01\x02\x03")),
            TlvValue::Periodicity { milliseconds: 1000 },
            TlvValue::Cell {
                pci: 1,
                dl_earfcn: 2,
                ul_earfcn: 3,
                n_prb: 4,
            },
            TlvValue::UeReport {
                imsi: 1,
                tmsi: 2,
                rnti: 3,
                status: 4,
                pci: 5,
            },
            TlvValue::UeMeasurementsConfig {
                rnti: 1,
                meas_id: 2,
                interval: 3,
                amount: 4,
            },
            TlvValue::UeMeasurementReport {
                rnti: 1,
                meas_id: 2,
                rsrp: 3,
                rsrq: 4,
            },
            TlvValue::UeMeasurementId { rnti: 1, meas_id: 2 },
            TlvValue::MacPrbUtilizationReport {
                n_prb: 1,
                dl_counters: 2,
                ul_counters: 3,
                pci: 4,
            },
        ];

        for value in &values {
            let buffer = frame_buffer();
            let mut encoder = MessageEncoder::new(buffer).unwrap();
            encoder
                .header()
                .message_class(MessageClass::RequestSet)
                .entity_class(EntityClass::CAPABILITIES_SERVICE)
                .element_id(0xE1)
                .sequence(5)
                .transaction_id(6);
            encoder.add(value).unwrap();
            encoder.end().unwrap();

            let mut decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
            assert_eq!(decoder.header().element_id(), 0xE1);
            assert_eq!(decoder.header().sequence(), 5);
            assert_eq!(decoder.header().transaction_id(), 6);
            assert_eq!(decoder.next_type(), value.tlv_type());
            assert_eq!(&decoder.get(value.tlv_type()).unwrap(), value);
        }
    }

    #[test]
    fn multiple_tlvs_walk_in_order() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::RequestSet);
        encoder
            .add(&TlvValue::Periodicity { milliseconds: 100 })
            .unwrap()
            .add(&TlvValue::binary_text("x"))
            .unwrap()
            .add(&TlvValue::UeMeasurementId { rnti: 9, meas_id: 1 })
            .unwrap();
        encoder.end().unwrap();

        let mut decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
        assert_eq!(decoder.next_type(), TlvType::Periodicity);
        decoder.get(TlvType::Periodicity).unwrap();
        assert_eq!(decoder.next_type(), TlvType::BinaryData);
        decoder.get(TlvType::BinaryData).unwrap();
        assert_eq!(decoder.next_type(), TlvType::UeMeasurementId);
        decoder.get(TlvType::UeMeasurementId).unwrap();
        assert_eq!(decoder.next_type(), TlvType::None);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::RequestGet);
        encoder
            .add(&TlvValue::Periodicity { milliseconds: 1 })
            .unwrap();
        encoder.end().unwrap();

        let mut decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
        let err = decoder.get(TlvType::Cell).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch {
                expected: TlvType::Cell,
                found: 5,
            }
        ));
    }

    #[test]
    fn declared_length_must_match_decoded_length() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer.clone()).unwrap();
        encoder.header().message_class(MessageClass::RequestGet);
        encoder
            .add(&TlvValue::Periodicity { milliseconds: 1 })
            .unwrap();
        encoder.end().unwrap();

        // Corrupt the TLV's declared length: claim 9 value bytes.
        buffer.set_u16(26, 13).unwrap();
        buffer.set_u32(4, 24 + 13).unwrap();

        let mut decoder = MessageDecoder::new(buffer.sub(0, 37).unwrap().as_view()).unwrap();
        let err = decoder.get(TlvType::Periodicity).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn next_type_accepts_frame_ending_at_last_tlv() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::RequestGet);
        encoder
            .add(&TlvValue::Periodicity { milliseconds: 1 })
            .unwrap();
        encoder.end().unwrap();

        // The frame ends exactly where the TLV ends; the TLV must
        // still be visible before the walk and invisible after.
        let decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
        assert_eq!(decoder.next_type(), TlvType::Periodicity);
    }

    #[test]
    fn next_type_rejects_truncated_tlv() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer.clone()).unwrap();
        encoder.header().message_class(MessageClass::RequestGet);
        encoder
            .add(&TlvValue::BinaryData(Bytes::from_static(&[0u8; 16])))
            .unwrap();
        encoder.end().unwrap();

        // Truncate the frame below the TLV's declared extent.
        let truncated = buffer.sub(0, 24 + 4 + 8).unwrap();
        let decoder = MessageDecoder::new(truncated.as_view()).unwrap();
        assert_eq!(decoder.next_type(), TlvType::None);
    }

    #[test]
    fn add_fails_when_frame_is_full() {
        let buffer = BufferWritableView::new(Region::with_capacity(30));
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        let err = encoder
            .add(&TlvValue::BinaryData(Bytes::from_static(&[0u8; 16])))
            .unwrap_err();
        assert!(matches!(err, CodecError::BufferTooSmall { .. }));
    }

    #[test]
    fn closed_encoder_rejects_further_use() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::RequestGet);
        encoder.end().unwrap();

        let err = encoder
            .add(&TlvValue::Periodicity { milliseconds: 1 })
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
        assert!(encoder.end().is_err());
    }

    #[test]
    fn empty_message_is_header_only() {
        let buffer = frame_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder.header().message_class(MessageClass::ResponseSuccess);
        encoder.end().unwrap();

        let data = encoder.data().unwrap();
        assert_eq!(data.len(), HEADER_LEN);
        assert_eq!(data.get_u32(4).unwrap(), HEADER_LEN as u32);
    }
}
