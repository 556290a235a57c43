//! The TLV registry and value objects.
//!
//! Each TLV on the wire is a 2-byte type, a 2-byte total length
//! (covering the 4-byte header) and a value. The registered set is
//! closed, so values are a sum type: [`TlvValue`] carries the field
//! state of one TLV and knows how to encode its value portion into a
//! writable view and decode it back from exactly one value-sized
//! view.

use std::fmt;

use agentwire_buffer::{BufferView, BufferWritableView};
use bytes::Bytes;

use crate::error::{CodecError, Result};

/// Registered TLV type identifiers. Value 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TlvType {
    None = 0,
    Error = 1,
    KeyValueStringPairs = 2,
    ListOfTlv = 3,
    BinaryData = 4,
    Periodicity = 5,
    Cell = 6,
    UeReport = 7,
    UeMeasurementsConfig = 8,
    UeMeasurementReport = 9,
    MacPrbUtilizationReport = 10,
    UeMeasurementId = 11,
}

impl TlvType {
    /// Map a wire value onto the registry.
    pub fn from_wire(raw: u16) -> Option<TlvType> {
        match raw {
            0 => Some(TlvType::None),
            1 => Some(TlvType::Error),
            2 => Some(TlvType::KeyValueStringPairs),
            3 => Some(TlvType::ListOfTlv),
            4 => Some(TlvType::BinaryData),
            5 => Some(TlvType::Periodicity),
            6 => Some(TlvType::Cell),
            7 => Some(TlvType::UeReport),
            8 => Some(TlvType::UeMeasurementsConfig),
            9 => Some(TlvType::UeMeasurementReport),
            10 => Some(TlvType::MacPrbUtilizationReport),
            11 => Some(TlvType::UeMeasurementId),
            _ => None,
        }
    }

    pub fn wire_value(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for TlvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TlvType::None => "NONE",
            TlvType::Error => "ERROR",
            TlvType::KeyValueStringPairs => "KEY_VALUE_STRING_PAIRS",
            TlvType::ListOfTlv => "LIST_OF_TLV",
            TlvType::BinaryData => "BINARY_DATA",
            TlvType::Periodicity => "PERIODICITY",
            TlvType::Cell => "CELL",
            TlvType::UeReport => "UE_REPORT",
            TlvType::UeMeasurementsConfig => "UE_MEASUREMENTS_CONFIG",
            TlvType::UeMeasurementReport => "UE_MEASUREMENT_REPORT",
            TlvType::MacPrbUtilizationReport => "MAC_PRB_UTILIZATION_REPORT",
            TlvType::UeMeasurementId => "UE_MEASUREMENT_ID",
        };
        f.write_str(name)
    }
}

/// The value state of one TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlvValue {
    /// Error code plus NUL-terminated free-text message.
    Error { errcode: u16, message: String },

    /// A sequence of NUL-terminated (key, value) string pairs.
    KeyValueStringPairs(Vec<(String, String)>),

    /// A count of inner TLVs of one type.
    ListOfTlv { inner_type: TlvType, count: u16 },

    /// Raw bytes.
    BinaryData(Bytes),

    /// A periodicity in milliseconds.
    Periodicity { milliseconds: u32 },

    /// Cell configuration.
    Cell {
        pci: u16,
        dl_earfcn: u32,
        ul_earfcn: u32,
        n_prb: u8,
    },

    /// UE status report.
    UeReport {
        imsi: u64,
        tmsi: u32,
        rnti: u16,
        status: u8,
        pci: u16,
    },

    /// UE measurement configuration.
    UeMeasurementsConfig {
        rnti: u16,
        meas_id: u8,
        interval: u8,
        amount: u8,
    },

    /// One UE measurement sample.
    UeMeasurementReport {
        rnti: u16,
        meas_id: u8,
        rsrp: u8,
        rsrq: u8,
    },

    /// Identifies one UE measurement.
    UeMeasurementId { rnti: u16, meas_id: u8 },

    /// MAC PRB utilization counters.
    MacPrbUtilizationReport {
        n_prb: u16,
        dl_counters: u32,
        ul_counters: u32,
        pci: u16,
    },
}

impl TlvValue {
    /// The registered type of this value.
    pub fn tlv_type(&self) -> TlvType {
        match self {
            TlvValue::Error { .. } => TlvType::Error,
            TlvValue::KeyValueStringPairs(_) => TlvType::KeyValueStringPairs,
            TlvValue::ListOfTlv { .. } => TlvType::ListOfTlv,
            TlvValue::BinaryData(_) => TlvType::BinaryData,
            TlvValue::Periodicity { .. } => TlvType::Periodicity,
            TlvValue::Cell { .. } => TlvType::Cell,
            TlvValue::UeReport { .. } => TlvType::UeReport,
            TlvValue::UeMeasurementsConfig { .. } => TlvType::UeMeasurementsConfig,
            TlvValue::UeMeasurementReport { .. } => TlvType::UeMeasurementReport,
            TlvValue::UeMeasurementId { .. } => TlvType::UeMeasurementId,
            TlvValue::MacPrbUtilizationReport { .. } => TlvType::MacPrbUtilizationReport,
        }
    }

    /// Binary data holding `s` as a NUL-terminated string.
    pub fn binary_text(s: &str) -> TlvValue {
        let mut data = Vec::with_capacity(s.len() + 1);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
        TlvValue::BinaryData(Bytes::from(data))
    }

    /// The C-string contents of a `BinaryData` value, if it is one.
    pub fn as_text(&self) -> Option<String> {
        let TlvValue::BinaryData(data) = self else {
            return None;
        };
        let end = data.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&data[..end]).ok().map(str::to_string)
    }

    /// Bytes the encoded value portion will occupy.
    pub fn encoded_len(&self) -> usize {
        match self {
            TlvValue::Error { message, .. } => 2 + message.len() + 1,
            TlvValue::KeyValueStringPairs(pairs) => pairs
                .iter()
                .map(|(k, v)| k.len() + 1 + v.len() + 1)
                .sum(),
            TlvValue::ListOfTlv { .. } => 4,
            TlvValue::BinaryData(data) => data.len(),
            TlvValue::Periodicity { .. } => 4,
            TlvValue::Cell { .. } => 11,
            TlvValue::UeReport { .. } => 17,
            TlvValue::UeMeasurementsConfig { .. } => 5,
            TlvValue::UeMeasurementReport { .. } => 5,
            TlvValue::UeMeasurementId { .. } => 3,
            TlvValue::MacPrbUtilizationReport { .. } => 12,
        }
    }

    /// Encode the value portion (without the TLV header) into the
    /// start of `buffer`.
    ///
    /// Fails `BufferTooSmall` — leaving the buffer untouched — when
    /// the view cannot hold the value. Returns the number of bytes
    /// written.
    pub fn encode(&self, buffer: &BufferWritableView) -> Result<usize> {
        let required = self.encoded_len();
        if buffer.len() < required {
            return Err(CodecError::BufferTooSmall {
                required,
                available: buffer.len(),
            });
        }

        match self {
            TlvValue::Error { errcode, message } => {
                buffer.set_u16_unchecked(0, *errcode);
                buffer.set_cstring(2, message)?;
            }
            TlvValue::KeyValueStringPairs(pairs) => {
                let mut offset = 0;
                for (key, value) in pairs {
                    buffer.set_cstring(offset, key)?;
                    offset += key.len() + 1;
                    buffer.set_cstring(offset, value)?;
                    offset += value.len() + 1;
                }
            }
            TlvValue::ListOfTlv { inner_type, count } => {
                buffer
                    .set_u16_unchecked(0, inner_type.wire_value())
                    .set_u16_unchecked(2, *count);
            }
            TlvValue::BinaryData(data) => {
                buffer.copy_from_slice(0, data)?;
            }
            TlvValue::Periodicity { milliseconds } => {
                buffer.set_u32_unchecked(0, *milliseconds);
            }
            TlvValue::Cell {
                pci,
                dl_earfcn,
                ul_earfcn,
                n_prb,
            } => {
                buffer
                    .set_u16_unchecked(0, *pci)
                    .set_u32_unchecked(2, *dl_earfcn)
                    .set_u32_unchecked(6, *ul_earfcn)
                    .set_u8_unchecked(10, *n_prb);
            }
            TlvValue::UeReport {
                imsi,
                tmsi,
                rnti,
                status,
                pci,
            } => {
                buffer
                    .set_u64_unchecked(0, *imsi)
                    .set_u32_unchecked(8, *tmsi)
                    .set_u16_unchecked(12, *rnti)
                    .set_u8_unchecked(14, *status)
                    .set_u16_unchecked(15, *pci);
            }
            TlvValue::UeMeasurementsConfig {
                rnti,
                meas_id,
                interval,
                amount,
            } => {
                buffer
                    .set_u16_unchecked(0, *rnti)
                    .set_u8_unchecked(2, *meas_id)
                    .set_u8_unchecked(3, *interval)
                    .set_u8_unchecked(4, *amount);
            }
            TlvValue::UeMeasurementReport {
                rnti,
                meas_id,
                rsrp,
                rsrq,
            } => {
                buffer
                    .set_u16_unchecked(0, *rnti)
                    .set_u8_unchecked(2, *meas_id)
                    .set_u8_unchecked(3, *rsrp)
                    .set_u8_unchecked(4, *rsrq);
            }
            TlvValue::UeMeasurementId { rnti, meas_id } => {
                buffer
                    .set_u16_unchecked(0, *rnti)
                    .set_u8_unchecked(2, *meas_id);
            }
            TlvValue::MacPrbUtilizationReport {
                n_prb,
                dl_counters,
                ul_counters,
                pci,
            } => {
                buffer
                    .set_u16_unchecked(0, *n_prb)
                    .set_u32_unchecked(2, *dl_counters)
                    .set_u32_unchecked(6, *ul_counters)
                    .set_u16_unchecked(10, *pci);
            }
        }

        Ok(required)
    }

    /// Decode a value of type `tlv_type` from the entirety of
    /// `buffer`.
    ///
    /// The decoded value must consume exactly `buffer.len()` bytes;
    /// anything else is `Malformed`.
    pub fn decode(tlv_type: TlvType, buffer: &BufferView) -> Result<TlvValue> {
        let value = match tlv_type {
            TlvType::None => {
                return Err(CodecError::InvalidArgument(
                    "TLV type NONE is reserved and carries no value".into(),
                ));
            }
            TlvType::Error => {
                let errcode = buffer.get_u16(0)?;
                let message = buffer.get_cstring(2)?;
                let consumed = 2 + message.len() + 1;
                if consumed != buffer.len() {
                    return Err(CodecError::Malformed(format!(
                        "ERROR TLV has {} trailing bytes after the message",
                        buffer.len() - consumed
                    )));
                }
                TlvValue::Error { errcode, message }
            }
            TlvType::KeyValueStringPairs => {
                let mut pairs = Vec::new();
                let mut offset = 0;
                while offset < buffer.len() {
                    let key = buffer.get_cstring(offset)?;
                    offset += key.len() + 1;
                    let value = buffer.get_cstring(offset)?;
                    offset += value.len() + 1;
                    pairs.push((key, value));
                }
                TlvValue::KeyValueStringPairs(pairs)
            }
            TlvType::ListOfTlv => {
                Self::expect_len(tlv_type, buffer, 4)?;
                TlvValue::ListOfTlv {
                    inner_type: TlvType::from_wire(buffer.get_u16_unchecked(0)).ok_or_else(
                        || {
                            CodecError::Malformed(format!(
                                "LIST_OF_TLV names unregistered inner type {}",
                                buffer.get_u16_unchecked(0)
                            ))
                        },
                    )?,
                    count: buffer.get_u16_unchecked(2),
                }
            }
            TlvType::BinaryData => TlvValue::BinaryData(Bytes::from(buffer.to_vec())),
            TlvType::Periodicity => {
                Self::expect_len(tlv_type, buffer, 4)?;
                TlvValue::Periodicity {
                    milliseconds: buffer.get_u32_unchecked(0),
                }
            }
            TlvType::Cell => {
                Self::expect_len(tlv_type, buffer, 11)?;
                TlvValue::Cell {
                    pci: buffer.get_u16_unchecked(0),
                    dl_earfcn: buffer.get_u32_unchecked(2),
                    ul_earfcn: buffer.get_u32_unchecked(6),
                    n_prb: buffer.get_u8_unchecked(10),
                }
            }
            TlvType::UeReport => {
                Self::expect_len(tlv_type, buffer, 17)?;
                TlvValue::UeReport {
                    imsi: buffer.get_u64_unchecked(0),
                    tmsi: buffer.get_u32_unchecked(8),
                    rnti: buffer.get_u16_unchecked(12),
                    status: buffer.get_u8_unchecked(14),
                    pci: buffer.get_u16_unchecked(15),
                }
            }
            TlvType::UeMeasurementsConfig => {
                Self::expect_len(tlv_type, buffer, 5)?;
                TlvValue::UeMeasurementsConfig {
                    rnti: buffer.get_u16_unchecked(0),
                    meas_id: buffer.get_u8_unchecked(2),
                    interval: buffer.get_u8_unchecked(3),
                    amount: buffer.get_u8_unchecked(4),
                }
            }
            TlvType::UeMeasurementReport => {
                Self::expect_len(tlv_type, buffer, 5)?;
                TlvValue::UeMeasurementReport {
                    rnti: buffer.get_u16_unchecked(0),
                    meas_id: buffer.get_u8_unchecked(2),
                    rsrp: buffer.get_u8_unchecked(3),
                    rsrq: buffer.get_u8_unchecked(4),
                }
            }
            TlvType::UeMeasurementId => {
                Self::expect_len(tlv_type, buffer, 3)?;
                TlvValue::UeMeasurementId {
                    rnti: buffer.get_u16_unchecked(0),
                    meas_id: buffer.get_u8_unchecked(2),
                }
            }
            TlvType::MacPrbUtilizationReport => {
                Self::expect_len(tlv_type, buffer, 12)?;
                TlvValue::MacPrbUtilizationReport {
                    n_prb: buffer.get_u16_unchecked(0),
                    dl_counters: buffer.get_u32_unchecked(2),
                    ul_counters: buffer.get_u32_unchecked(6),
                    pci: buffer.get_u16_unchecked(10),
                }
            }
        };
        Ok(value)
    }

    fn expect_len(tlv_type: TlvType, buffer: &BufferView, expected: usize) -> Result<()> {
        if buffer.len() != expected {
            return Err(CodecError::Malformed(format!(
                "{tlv_type} value must be {expected} bytes, got {}",
                buffer.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use agentwire_buffer::{BufferWritableView, Region};

    use super::*;

    fn scratch(len: usize) -> BufferWritableView {
        BufferWritableView::new(Region::with_capacity(len))
    }

    fn value_roundtrip(value: &TlvValue) -> TlvValue {
        let buffer = scratch(256);
        let written = value.encode(&buffer).unwrap();
        assert_eq!(written, value.encoded_len());
        let view = buffer.sub(0, written).unwrap();
        TlvValue::decode(value.tlv_type(), &view.as_view()).unwrap()
    }

    #[test]
    fn canonical_type_numbering() {
        assert_eq!(TlvType::None.wire_value(), 0);
        assert_eq!(TlvType::Error.wire_value(), 1);
        assert_eq!(TlvType::KeyValueStringPairs.wire_value(), 2);
        assert_eq!(TlvType::ListOfTlv.wire_value(), 3);
        assert_eq!(TlvType::BinaryData.wire_value(), 4);
        assert_eq!(TlvType::Periodicity.wire_value(), 5);
        assert_eq!(TlvType::Cell.wire_value(), 6);
        assert_eq!(TlvType::UeReport.wire_value(), 7);
        assert_eq!(TlvType::UeMeasurementsConfig.wire_value(), 8);
        assert_eq!(TlvType::UeMeasurementReport.wire_value(), 9);
        assert_eq!(TlvType::MacPrbUtilizationReport.wire_value(), 10);
        assert_eq!(TlvType::UeMeasurementId.wire_value(), 11);

        for raw in 0..=11 {
            assert_eq!(TlvType::from_wire(raw).unwrap().wire_value(), raw);
        }
        assert!(TlvType::from_wire(12).is_none());
    }

    #[test]
    fn error_value_roundtrip_and_layout() {
        let value = TlvValue::Error {
            errcode: 42,
            message: "12345".into(),
        };
        assert_eq!(value_roundtrip(&value), value);

        let buffer = scratch(8);
        let written = value.encode(&buffer).unwrap();
        assert_eq!(written, 8);
        assert_eq!(
            buffer.sub(0, 8).unwrap().to_vec(),
            [0x00, 0x2A, b'1', b'2', b'3', b'4', b'5', 0x00]
        );
    }

    #[test]
    fn error_value_rejects_trailing_bytes() {
        let buffer = scratch(10);
        TlvValue::Error {
            errcode: 1,
            message: "ab".into(),
        }
        .encode(&buffer)
        .unwrap();
        // 5 value bytes plus 5 stray zeros.
        let err = TlvValue::decode(TlvType::Error, &buffer.as_view()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn key_value_pairs_roundtrip() {
        let value = TlvValue::KeyValueStringPairs(vec![
            ("vendor".into(), "acme".into()),
            ("model".into(), "enb-4200".into()),
            ("".into(), "empty-key-is-legal".into()),
        ]);
        assert_eq!(value_roundtrip(&value), value);
    }

    #[test]
    fn key_value_pairs_missing_value_is_malformed() {
        let buffer = scratch(4);
        buffer.set_cstring(0, "key").unwrap();
        let err =
            TlvValue::decode(TlvType::KeyValueStringPairs, &buffer.as_view()).unwrap_err();
        assert!(matches!(err, CodecError::Buffer(_) | CodecError::Malformed(_)));
    }

    #[test]
    fn key_value_pairs_two_pass_encode_checks_room_first() {
        let value = TlvValue::KeyValueStringPairs(vec![("a".into(), "b".into()); 8]);
        let buffer = scratch(8);
        let before = buffer.to_vec();
        let err = value.encode(&buffer).unwrap_err();
        assert!(matches!(err, CodecError::BufferTooSmall { .. }));
        assert_eq!(buffer.to_vec(), before);
    }

    #[test]
    fn binary_data_roundtrip() {
        let value = TlvValue::BinaryData(Bytes::from_static(b"\x00\x01\x02raw"));
        assert_eq!(value_roundtrip(&value), value);
    }

    #[test]
    fn binary_text_helpers() {
        let value = TlvValue::binary_text("Is there anybody out there?");
        assert_eq!(value.encoded_len(), 28);
        assert_eq!(value.as_text().unwrap(), "Is there anybody out there?");
        assert!(TlvValue::Periodicity { milliseconds: 1 }.as_text().is_none());
    }

    #[test]
    fn fixed_layout_values_roundtrip() {
        let values = [
            TlvValue::ListOfTlv {
                inner_type: TlvType::Cell,
                count: 3,
            },
            TlvValue::Periodicity { milliseconds: 1500 },
            TlvValue::Cell {
                pci: 7,
                dl_earfcn: 3350,
                ul_earfcn: 21350,
                n_prb: 50,
            },
            TlvValue::UeReport {
                imsi: 222_01_0123456789,
                tmsi: 0xDEAD_BEEF,
                rnti: 0x4601,
                status: 1,
                pci: 7,
            },
            TlvValue::UeMeasurementsConfig {
                rnti: 0x4601,
                meas_id: 2,
                interval: 10,
                amount: 8,
            },
            TlvValue::UeMeasurementReport {
                rnti: 0x4601,
                meas_id: 2,
                rsrp: 90,
                rsrq: 20,
            },
            TlvValue::UeMeasurementId {
                rnti: 0x4601,
                meas_id: 2,
            },
            TlvValue::MacPrbUtilizationReport {
                n_prb: 100,
                dl_counters: 12345,
                ul_counters: 6789,
                pci: 7,
            },
        ];

        for value in values {
            assert_eq!(value_roundtrip(&value), value);
        }
    }

    #[test]
    fn cell_layout_is_byte_exact() {
        let value = TlvValue::Cell {
            pci: 0x0102,
            dl_earfcn: 0x0304_0506,
            ul_earfcn: 0x0708_090A,
            n_prb: 0x0B,
        };
        let buffer = scratch(11);
        value.encode(&buffer).unwrap();
        assert_eq!(
            buffer.to_vec(),
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B]
        );
    }

    #[test]
    fn fixed_layout_length_is_enforced() {
        let buffer = scratch(10);
        let err = TlvValue::decode(TlvType::Cell, &buffer.as_view()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));

        let buffer = scratch(12);
        let err = TlvValue::decode(TlvType::Cell, &buffer.as_view()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn encode_too_small_leaves_buffer_unchanged() {
        let value = TlvValue::BinaryData(Bytes::from(vec![0xAB; 100]));
        let buffer = scratch(50);
        let before = buffer.to_vec();
        let err = value.encode(&buffer).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BufferTooSmall {
                required: 100,
                available: 50,
            }
        ));
        assert_eq!(buffer.to_vec(), before);
    }

    #[test]
    fn decode_none_is_rejected() {
        let buffer = scratch(4);
        let err = TlvValue::decode(TlvType::None, &buffer.as_view()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
    }
}
