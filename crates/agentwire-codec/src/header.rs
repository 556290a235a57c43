//! Preamble and common-header codec.
//!
//! The common header is 24 bytes:
//!
//! ```text
//! 0      1      2             4                    8
//! +------+------+-------------+--------------------+
//! | ver  | flags| ts_rc       | length             |
//! +------+------+-------------+--------------------+
//! 8                           16        20         24
//! +---------------------------+---------+----------+
//! | element_id                | sequence| txn_id   |
//! +---------------------------+---------+----------+
//! ```
//!
//! Flag bit 7 discriminates request (0) from response (1); the other
//! flag bits are reserved, written zero and ignored on read. `ts_rc`
//! packs the 14-bit entity class (bits 0-13) with two operation bits
//! (14-15): the request operation for requests, or the outcome in bit
//! 15 alone for responses.

use agentwire_buffer::{BufferView, BufferWritableView};

use crate::error::{CodecError, Result};

/// Preamble length in bytes.
pub const PREAMBLE_LEN: usize = 8;

/// Full common-header length in bytes, preamble included.
pub const HEADER_LEN: usize = 24;

/// The only protocol version this codec speaks.
pub const PROTOCOL_VERSION: u8 = 2;

/// Minimum frame size accepted by the decoder: the common header plus
/// room for at least one TLV header.
pub(crate) const MIN_DECODE_LEN: usize = HEADER_LEN + 4;

pub const VERSION_OFFSET: usize = 0;
pub const FLAGS_OFFSET: usize = 1;
pub const TSRC_OFFSET: usize = 2;
pub const LENGTH_OFFSET: usize = 4;
pub const ELEMENT_ID_OFFSET: usize = 8;
pub const SEQUENCE_OFFSET: usize = 16;
pub const TRANSACTION_ID_OFFSET: usize = 20;

const FLAG_RESPONSE: u8 = 1 << 7;
const ENTITY_MASK: u16 = 0x3FFF;

/// The six-valued message class packed into flags + ts_rc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    RequestSet,
    RequestAdd,
    RequestDel,
    RequestGet,
    ResponseSuccess,
    ResponseFailure,
}

impl MessageClass {
    pub fn is_request(self) -> bool {
        matches!(
            self,
            MessageClass::RequestSet
                | MessageClass::RequestAdd
                | MessageClass::RequestDel
                | MessageClass::RequestGet
        )
    }
}

impl std::fmt::Display for MessageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageClass::RequestSet => "REQUEST_SET",
            MessageClass::RequestAdd => "REQUEST_ADD",
            MessageClass::RequestDel => "REQUEST_DEL",
            MessageClass::RequestGet => "REQUEST_GET",
            MessageClass::ResponseSuccess => "RESPONSE_SUCCESS",
            MessageClass::ResponseFailure => "RESPONSE_FAILURE",
        };
        f.write_str(name)
    }
}

/// The logical service a message addresses (14-bit field).
///
/// Values outside the named constants are reserved extension space,
/// so this is an open newtype rather than a closed enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntityClass(pub u16);

impl EntityClass {
    pub const HELLO_SERVICE: EntityClass = EntityClass(0x00);
    pub const CAPABILITIES_SERVICE: EntityClass = EntityClass(0x01);
    pub const ECHO_SERVICE: EntityClass = EntityClass(0xFF);

    pub fn value(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for EntityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            EntityClass::HELLO_SERVICE => write!(f, "HELLO_SERVICE"),
            EntityClass::CAPABILITIES_SERVICE => write!(f, "CAPABILITIES_SERVICE"),
            EntityClass::ECHO_SERVICE => write!(f, "ECHO_SERVICE"),
            EntityClass(other) => write!(f, "ENTITY({other:#06x})"),
        }
    }
}

/// Decodes the common header of a received frame.
#[derive(Debug)]
pub struct CommonHeaderDecoder {
    view: BufferView,
}

impl CommonHeaderDecoder {
    /// Attach to a frame view.
    ///
    /// Fails `Malformed` if the view cannot hold the header plus one
    /// TLV header, or if the version field is not 2. Field accessors
    /// rely on these construction-time checks.
    pub fn new(view: BufferView) -> Result<CommonHeaderDecoder> {
        if view.len() < MIN_DECODE_LEN {
            return Err(CodecError::Malformed(format!(
                "frame too short for common header ({} bytes, minimum {MIN_DECODE_LEN})",
                view.len()
            )));
        }
        let decoder = CommonHeaderDecoder { view };
        let version = decoder.version();
        if version != PROTOCOL_VERSION {
            return Err(CodecError::Malformed(format!(
                "unsupported protocol version {version} (expected {PROTOCOL_VERSION})"
            )));
        }
        Ok(decoder)
    }

    pub fn version(&self) -> u8 {
        self.view.get_u8_unchecked(VERSION_OFFSET)
    }

    pub fn flags(&self) -> u8 {
        self.view.get_u8_unchecked(FLAGS_OFFSET)
    }

    pub fn ts_rc(&self) -> u16 {
        self.view.get_u16_unchecked(TSRC_OFFSET)
    }

    /// Total frame length as declared by the preamble.
    pub fn total_length(&self) -> usize {
        self.view.get_u32_unchecked(LENGTH_OFFSET) as usize
    }

    pub fn element_id(&self) -> u64 {
        self.view.get_u64_unchecked(ELEMENT_ID_OFFSET)
    }

    pub fn sequence(&self) -> u32 {
        self.view.get_u32_unchecked(SEQUENCE_OFFSET)
    }

    pub fn transaction_id(&self) -> u32 {
        self.view.get_u32_unchecked(TRANSACTION_ID_OFFSET)
    }

    /// Decode flags + ts_rc into the message class.
    pub fn message_class(&self) -> MessageClass {
        let ts_rc = self.ts_rc();
        if self.flags() & FLAG_RESPONSE == 0 {
            match (ts_rc >> 14) & 0x3 {
                0 => MessageClass::RequestSet,
                1 => MessageClass::RequestAdd,
                2 => MessageClass::RequestDel,
                _ => MessageClass::RequestGet,
            }
        } else if (ts_rc >> 15) & 0x1 == 0 {
            MessageClass::ResponseSuccess
        } else {
            MessageClass::ResponseFailure
        }
    }

    /// The entity class from the low 14 bits of ts_rc.
    pub fn entity_class(&self) -> EntityClass {
        EntityClass(self.ts_rc() & ENTITY_MASK)
    }

    /// The payload after the common header, up to the declared length.
    pub fn payload(&self) -> Result<BufferView> {
        let total = self.total_length();
        if total < HEADER_LEN {
            return Err(CodecError::Malformed(format!(
                "declared frame length {total} is shorter than the common header"
            )));
        }
        Ok(self.view.sub(HEADER_LEN, total - HEADER_LEN)?)
    }

    pub fn size(&self) -> usize {
        HEADER_LEN
    }
}

/// Encodes the common header into a frame under construction.
///
/// Construction writes the defaults (version 2, everything else
/// zero); setters are chainable and infallible afterwards, each
/// touching only its own bits.
#[derive(Debug)]
pub struct CommonHeaderEncoder {
    view: BufferWritableView,
}

impl CommonHeaderEncoder {
    /// Attach to a writable frame view and write the defaults.
    pub fn new(view: BufferWritableView) -> Result<CommonHeaderEncoder> {
        if view.len() < HEADER_LEN {
            return Err(CodecError::BufferTooSmall {
                required: HEADER_LEN,
                available: view.len(),
            });
        }
        view.set_u8_unchecked(VERSION_OFFSET, PROTOCOL_VERSION)
            .set_u8_unchecked(FLAGS_OFFSET, 0)
            .set_u16_unchecked(TSRC_OFFSET, 0)
            .set_u32_unchecked(LENGTH_OFFSET, 0)
            .set_u64_unchecked(ELEMENT_ID_OFFSET, 0)
            .set_u32_unchecked(SEQUENCE_OFFSET, 0)
            .set_u32_unchecked(TRANSACTION_ID_OFFSET, 0);
        Ok(CommonHeaderEncoder { view })
    }

    /// Rewrite flag bit 7 and ts_rc bits 14-15 for the given class,
    /// preserving the reserved flag bits and the entity class.
    pub fn message_class(&mut self, class: MessageClass) -> &mut Self {
        let saved_flags = self.view.get_u8_unchecked(FLAGS_OFFSET) & !FLAG_RESPONSE;
        let saved_entity = self.view.get_u16_unchecked(TSRC_OFFSET) & ENTITY_MASK;

        let (is_request, high_bits): (bool, u16) = match class {
            MessageClass::RequestSet => (true, 0),
            MessageClass::RequestAdd => (true, 1),
            MessageClass::RequestDel => (true, 2),
            MessageClass::RequestGet => (true, 3),
            MessageClass::ResponseSuccess => (false, 0),
            MessageClass::ResponseFailure => (false, 2),
        };

        let flags = if is_request {
            saved_flags
        } else {
            saved_flags | FLAG_RESPONSE
        };
        self.view
            .set_u8_unchecked(FLAGS_OFFSET, flags)
            .set_u16_unchecked(TSRC_OFFSET, saved_entity | (high_bits << 14));
        self
    }

    /// Rewrite the 14-bit entity class, preserving the operation bits.
    pub fn entity_class(&mut self, entity: EntityClass) -> &mut Self {
        let saved_op = self.view.get_u16_unchecked(TSRC_OFFSET) & !ENTITY_MASK;
        self.view
            .set_u16_unchecked(TSRC_OFFSET, saved_op | (entity.value() & ENTITY_MASK));
        self
    }

    pub fn total_length(&mut self, length: u32) -> &mut Self {
        self.view.set_u32_unchecked(LENGTH_OFFSET, length);
        self
    }

    pub fn element_id(&mut self, v: u64) -> &mut Self {
        self.view.set_u64_unchecked(ELEMENT_ID_OFFSET, v);
        self
    }

    pub fn sequence(&mut self, v: u32) -> &mut Self {
        self.view.set_u32_unchecked(SEQUENCE_OFFSET, v);
        self
    }

    pub fn transaction_id(&mut self, v: u32) -> &mut Self {
        self.view.set_u32_unchecked(TRANSACTION_ID_OFFSET, v);
        self
    }

    pub fn size(&self) -> usize {
        HEADER_LEN
    }
}
