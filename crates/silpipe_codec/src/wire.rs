//! Binary wire format: packet framing and file-header framing.
//!
//! A log file starts with a four-byte magic — `SILF` for plaintext or
//! `SILE` followed by a 16-byte initialization vector for encrypted
//! files — and then carries a sequence of framed packets. Each packet
//! is a kind tag (u16 LE) plus a body length (u32 LE) plus the body:
//! a fixed-size header with u32 length prefixes for string fields,
//! the string bytes in field order, then any binary payload. All
//! integers are little-endian, all strings UTF-8.
//!
//! Absent and empty optional fields are the same wire state: both
//! encode as zero length and a zero length decodes to `None`.

use crate::error::{CodecError, CodecResult};
use crate::level::Level;
use crate::packet::{
    ControlCommand, ControlCommandType, LogEntry, LogEntryType, Packet, PacketBody, PacketKind,
    ProcessFlow, ProcessFlowType, ViewerId, Watch, WatchType,
};

/// Magic bytes opening a plaintext log file.
pub const FILE_MAGIC_PLAIN: [u8; 4] = *b"SILF";

/// Magic bytes opening an encrypted log file.
pub const FILE_MAGIC_ENCRYPTED: [u8; 4] = *b"SILE";

/// Length of the initialization vector following the encrypted magic.
pub const FILE_IV_LEN: usize = 16;

/// Envelope size: kind tag (2) + body length (4).
pub const ENVELOPE_SIZE: usize = 6;

/// Fixed header size of a log entry body.
pub const LOG_ENTRY_HEADER: usize = 48;

/// Fixed header size of a watch body.
pub const WATCH_HEADER: usize = 24;

/// Fixed header size of a control command body.
pub const CONTROL_COMMAND_HEADER: usize = 20;

/// Fixed header size of a process-flow body.
pub const PROCESS_FLOW_HEADER: usize = 24;

fn opt_str_len(s: &Option<String>) -> usize {
    s.as_ref().map_or(0, String::len)
}

fn opt_data_len(d: &Option<Vec<u8>>) -> usize {
    d.as_ref().map_or(0, Vec::len)
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: usize) {
    debug_assert!(value <= u32::MAX as usize, "field exceeds u32 framing");
    buf.extend_from_slice(&(value as u32).to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_opt_str(buf: &mut Vec<u8>, s: &Option<String>) {
    if let Some(s) = s {
        buf.extend_from_slice(s.as_bytes());
    }
}

fn put_opt_data(buf: &mut Vec<u8>, d: &Option<Vec<u8>>) {
    if let Some(d) = d {
        buf.extend_from_slice(d);
    }
}

impl Packet {
    /// Returns the exact encoded size of this packet in bytes.
    ///
    /// Invariant: `packet.size() == packet.encode().len()` for every
    /// reachable packet state. File rotation accounting relies on it.
    #[must_use]
    pub fn size(&self) -> usize {
        ENVELOPE_SIZE + self.body_size()
    }

    fn body_size(&self) -> usize {
        match self.body() {
            PacketBody::LogEntry(e) => {
                LOG_ENTRY_HEADER
                    + opt_str_len(&e.app_name)
                    + opt_str_len(&e.session_name)
                    + opt_str_len(&e.title)
                    + opt_str_len(&e.host_name)
                    + opt_data_len(&e.data)
            }
            PacketBody::Watch(w) => WATCH_HEADER + w.name.len() + w.value.len(),
            PacketBody::ControlCommand(c) => CONTROL_COMMAND_HEADER + opt_data_len(&c.data),
            PacketBody::ProcessFlow(f) => {
                PROCESS_FLOW_HEADER + opt_str_len(&f.title) + opt_str_len(&f.host_name)
            }
        }
    }

    /// Encodes the packet into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode_into(&mut buf);
        buf
    }

    /// Appends the encoded packet to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.kind().as_u16().to_le_bytes());
        put_u32(buf, self.body_size());

        match self.body() {
            PacketBody::LogEntry(e) => {
                put_i32(buf, self.level().as_i32());
                put_i32(buf, e.entry_type.as_i32());
                put_i32(buf, e.viewer_id.as_i32());
                put_u32(buf, opt_str_len(&e.app_name));
                put_u32(buf, opt_str_len(&e.session_name));
                put_u32(buf, opt_str_len(&e.title));
                put_u32(buf, opt_str_len(&e.host_name));
                put_u32(buf, opt_data_len(&e.data));
                buf.extend_from_slice(&e.correlation_id.to_le_bytes());
                put_u64(buf, self.timestamp());
                buf.extend_from_slice(&e.color.to_le_bytes());
                put_opt_str(buf, &e.app_name);
                put_opt_str(buf, &e.session_name);
                put_opt_str(buf, &e.title);
                put_opt_str(buf, &e.host_name);
                put_opt_data(buf, &e.data);
            }
            PacketBody::Watch(w) => {
                put_i32(buf, self.level().as_i32());
                put_i32(buf, w.watch_type.as_i32());
                put_u32(buf, w.name.len());
                put_u32(buf, w.value.len());
                put_u64(buf, self.timestamp());
                buf.extend_from_slice(w.name.as_bytes());
                buf.extend_from_slice(w.value.as_bytes());
            }
            PacketBody::ControlCommand(c) => {
                put_i32(buf, self.level().as_i32());
                put_i32(buf, c.command_type.as_i32());
                put_u32(buf, opt_data_len(&c.data));
                put_u64(buf, self.timestamp());
                put_opt_data(buf, &c.data);
            }
            PacketBody::ProcessFlow(f) => {
                put_i32(buf, self.level().as_i32());
                put_i32(buf, f.flow_type.as_i32());
                put_u32(buf, opt_str_len(&f.title));
                put_u32(buf, opt_str_len(&f.host_name));
                put_u64(buf, self.timestamp());
                put_opt_str(buf, &f.title);
                put_opt_str(buf, &f.host_name);
            }
        }
    }

    /// Decodes one packet from the start of `bytes`.
    ///
    /// Returns the packet and the number of bytes consumed. Decoded
    /// packets are never marked thread-safe.
    pub fn decode(bytes: &[u8]) -> CodecResult<(Packet, usize)> {
        if bytes.len() < ENVELOPE_SIZE {
            return Err(CodecError::truncated("packet envelope"));
        }
        let kind_tag = u16::from_le_bytes([bytes[0], bytes[1]]);
        let kind = PacketKind::from_u16(kind_tag)
            .ok_or(CodecError::UnknownKind { kind: kind_tag })?;
        let declared = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;

        let body = bytes
            .get(ENVELOPE_SIZE..ENVELOPE_SIZE + declared)
            .ok_or_else(|| CodecError::truncated("packet body"))?;

        let mut cursor = 0usize;

        let read_i32 = |cursor: &mut usize| -> CodecResult<i32> {
            let bytes: [u8; 4] = body
                .get(*cursor..*cursor + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| CodecError::truncated("i32 field"))?;
            *cursor += 4;
            Ok(i32::from_le_bytes(bytes))
        };

        let read_u32 = |cursor: &mut usize| -> CodecResult<u32> {
            let bytes: [u8; 4] = body
                .get(*cursor..*cursor + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| CodecError::truncated("u32 field"))?;
            *cursor += 4;
            Ok(u32::from_le_bytes(bytes))
        };

        let read_u64 = |cursor: &mut usize| -> CodecResult<u64> {
            let bytes: [u8; 8] = body
                .get(*cursor..*cursor + 8)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| CodecError::truncated("u64 field"))?;
            *cursor += 8;
            Ok(u64::from_le_bytes(bytes))
        };

        let read_str = |cursor: &mut usize,
                        len: u32,
                        field: &'static str|
         -> CodecResult<Option<String>> {
            let len = len as usize;
            if len == 0 {
                return Ok(None);
            }
            let raw = body
                .get(*cursor..*cursor + len)
                .ok_or_else(|| CodecError::truncated(field))?;
            *cursor += len;
            let s = std::str::from_utf8(raw)
                .map_err(|_| CodecError::InvalidUtf8 { field })?
                .to_owned();
            Ok(Some(s))
        };

        let read_data =
            |cursor: &mut usize, len: u32, field: &'static str| -> CodecResult<Option<Vec<u8>>> {
                let len = len as usize;
                if len == 0 {
                    return Ok(None);
                }
                let raw = body
                    .get(*cursor..*cursor + len)
                    .ok_or_else(|| CodecError::truncated(field))?;
                *cursor += len;
                Ok(Some(raw.to_vec()))
            };

        let read_level = |cursor: &mut usize| -> CodecResult<Level> {
            let raw = read_i32(cursor)?;
            Level::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                field: "level",
                value: raw,
            })
        };

        let packet = match kind {
            PacketKind::LogEntry => {
                let level = read_level(&mut cursor)?;
                let raw = read_i32(&mut cursor)?;
                let entry_type =
                    LogEntryType::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                        field: "entry_type",
                        value: raw,
                    })?;
                let raw = read_i32(&mut cursor)?;
                let viewer_id = ViewerId::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                    field: "viewer_id",
                    value: raw,
                })?;
                let app_len = read_u32(&mut cursor)?;
                let session_len = read_u32(&mut cursor)?;
                let title_len = read_u32(&mut cursor)?;
                let host_len = read_u32(&mut cursor)?;
                let data_len = read_u32(&mut cursor)?;
                let correlation_id = read_u32(&mut cursor)?;
                let timestamp = read_u64(&mut cursor)?;
                let color = read_u32(&mut cursor)?;
                let app_name = read_str(&mut cursor, app_len, "app_name")?;
                let session_name = read_str(&mut cursor, session_len, "session_name")?;
                let title = read_str(&mut cursor, title_len, "title")?;
                let host_name = read_str(&mut cursor, host_len, "host_name")?;
                let data = read_data(&mut cursor, data_len, "data")?;
                Packet::log_entry(
                    level,
                    timestamp,
                    LogEntry {
                        entry_type,
                        viewer_id,
                        app_name,
                        session_name,
                        title,
                        host_name,
                        correlation_id,
                        color,
                        data,
                    },
                )
            }
            PacketKind::Watch => {
                let level = read_level(&mut cursor)?;
                let raw = read_i32(&mut cursor)?;
                let watch_type = WatchType::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                    field: "watch_type",
                    value: raw,
                })?;
                let name_len = read_u32(&mut cursor)?;
                let value_len = read_u32(&mut cursor)?;
                let timestamp = read_u64(&mut cursor)?;
                let name = read_str(&mut cursor, name_len, "name")?.unwrap_or_default();
                let value = read_str(&mut cursor, value_len, "value")?.unwrap_or_default();
                Packet::watch(
                    level,
                    timestamp,
                    Watch {
                        name,
                        value,
                        watch_type,
                    },
                )
            }
            PacketKind::ControlCommand => {
                let level = read_level(&mut cursor)?;
                let raw = read_i32(&mut cursor)?;
                let command_type =
                    ControlCommandType::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                        field: "command_type",
                        value: raw,
                    })?;
                let data_len = read_u32(&mut cursor)?;
                let timestamp = read_u64(&mut cursor)?;
                let data = read_data(&mut cursor, data_len, "data")?;
                Packet::new(
                    level,
                    timestamp,
                    PacketBody::ControlCommand(ControlCommand { command_type, data }),
                )
            }
            PacketKind::ProcessFlow => {
                let level = read_level(&mut cursor)?;
                let raw = read_i32(&mut cursor)?;
                let flow_type =
                    ProcessFlowType::from_i32(raw).ok_or(CodecError::UnknownOrdinal {
                        field: "flow_type",
                        value: raw,
                    })?;
                let title_len = read_u32(&mut cursor)?;
                let host_len = read_u32(&mut cursor)?;
                let timestamp = read_u64(&mut cursor)?;
                let title = read_str(&mut cursor, title_len, "title")?;
                let host_name = read_str(&mut cursor, host_len, "host_name")?;
                Packet::process_flow(
                    level,
                    timestamp,
                    ProcessFlow {
                        flow_type,
                        title,
                        host_name,
                    },
                )
            }
        };

        if cursor != declared {
            return Err(CodecError::BodyLengthMismatch {
                declared,
                consumed: cursor,
            });
        }

        Ok((packet, ENVELOPE_SIZE + declared))
    }

    /// Decodes every packet in `bytes` (after any file header).
    pub fn decode_all(mut bytes: &[u8]) -> CodecResult<Vec<Packet>> {
        let mut packets = Vec::new();
        while !bytes.is_empty() {
            let (packet, consumed) = Packet::decode(bytes)?;
            packets.push(packet);
            bytes = &bytes[consumed..];
        }
        Ok(packets)
    }
}

/// File-level header framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileHeader {
    /// Plaintext file: `SILF`.
    Plaintext,
    /// Encrypted file: `SILE` followed by the initialization vector,
    /// written in the clear.
    Encrypted {
        /// The per-connection initialization vector.
        iv: [u8; FILE_IV_LEN],
    },
}

impl FileHeader {
    /// Creates a plaintext header.
    #[must_use]
    pub fn plaintext() -> Self {
        Self::Plaintext
    }

    /// Creates an encrypted header with the given IV.
    #[must_use]
    pub fn encrypted(iv: [u8; FILE_IV_LEN]) -> Self {
        Self::Encrypted { iv }
    }

    /// Returns the encoded header size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Plaintext => FILE_MAGIC_PLAIN.len(),
            Self::Encrypted { .. } => FILE_MAGIC_ENCRYPTED.len() + FILE_IV_LEN,
        }
    }

    /// Encodes the header into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        match self {
            Self::Plaintext => buf.extend_from_slice(&FILE_MAGIC_PLAIN),
            Self::Encrypted { iv } => {
                buf.extend_from_slice(&FILE_MAGIC_ENCRYPTED);
                buf.extend_from_slice(iv);
            }
        }
        buf
    }

    /// Writes the header to `writer`.
    pub fn write_to<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.encode())
    }

    /// Reads a header from the start of `bytes`.
    ///
    /// Returns the header and the number of bytes consumed.
    pub fn read_from(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        let magic: [u8; 4] = bytes
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CodecError::truncated("file magic"))?;
        if magic == FILE_MAGIC_PLAIN {
            return Ok((Self::Plaintext, 4));
        }
        if magic == FILE_MAGIC_ENCRYPTED {
            let iv: [u8; FILE_IV_LEN] = bytes
                .get(4..4 + FILE_IV_LEN)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| CodecError::truncated("initialization vector"))?;
            return Ok((Self::Encrypted { iv }, 4 + FILE_IV_LEN));
        }
        Err(CodecError::InvalidMagic { found: magic })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log_entry() -> Packet {
        Packet::log_entry(
            Level::Message,
            1_700_000_000_000_000,
            LogEntry {
                entry_type: LogEntryType::Message,
                viewer_id: ViewerId::Title,
                app_name: Some("app".into()),
                session_name: Some("main".into()),
                title: Some("hello".into()),
                host_name: Some("host".into()),
                correlation_id: 42,
                color: 0xFF11_2233,
                data: Some(vec![1, 2, 3]),
            },
        )
    }

    #[test]
    fn log_entry_header_is_48_bytes() {
        let packet = Packet::log_entry(Level::Message, 0, LogEntry::default());
        assert_eq!(packet.size(), ENVELOPE_SIZE + LOG_ENTRY_HEADER);
        assert_eq!(packet.encode().len(), ENVELOPE_SIZE + LOG_ENTRY_HEADER);
    }

    #[test]
    fn size_matches_encode_len() {
        let packets = [
            sample_log_entry(),
            Packet::watch(
                Level::Debug,
                5,
                Watch {
                    name: "counter".into(),
                    value: "12".into(),
                    watch_type: WatchType::Integer,
                },
            ),
            Packet::control_command(
                9,
                ControlCommand {
                    command_type: ControlCommandType::ClearAll,
                    data: Some(vec![0xCA, 0xFE]),
                },
            ),
            Packet::process_flow(
                Level::Verbose,
                11,
                ProcessFlow {
                    flow_type: ProcessFlowType::EnterMethod,
                    title: Some("run".into()),
                    host_name: None,
                },
            ),
        ];
        for packet in packets {
            assert_eq!(packet.size(), packet.encode().len());
        }
    }

    #[test]
    fn log_entry_roundtrip() {
        let packet = sample_log_entry();
        let encoded = packet.encode();
        let (decoded, consumed) = Packet::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, packet);
    }

    #[test]
    fn watch_roundtrip() {
        let packet = Packet::watch(
            Level::Warning,
            77,
            Watch {
                name: "flag".into(),
                value: "true".into(),
                watch_type: WatchType::Boolean,
            },
        );
        let (decoded, _) = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn control_command_roundtrip() {
        let packet = Packet::control_command(
            3,
            ControlCommand {
                command_type: ControlCommandType::ClearWatches,
                data: None,
            },
        );
        let (decoded, _) = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn process_flow_roundtrip() {
        let packet = Packet::process_flow(
            Level::Message,
            8,
            ProcessFlow {
                flow_type: ProcessFlowType::LeaveThread,
                title: Some("worker".into()),
                host_name: Some("h".into()),
            },
        );
        let (decoded, _) = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn empty_and_absent_strings_encode_identically() {
        let absent = Packet::log_entry(Level::Message, 0, LogEntry::default());
        let empty = Packet::log_entry(
            Level::Message,
            0,
            LogEntry {
                title: Some(String::new()),
                data: Some(Vec::new()),
                ..LogEntry::default()
            },
        );
        assert_eq!(absent.encode(), empty.encode());

        // Both decode to the canonical absent state.
        let (decoded, _) = Packet::decode(&empty.encode()).unwrap();
        match decoded.body() {
            PacketBody::LogEntry(e) => {
                assert_eq!(e.title, None);
                assert_eq!(e.data, None);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn truncated_envelope_rejected() {
        let err = Packet::decode(&[4, 0, 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn truncated_body_rejected() {
        let mut encoded = sample_log_entry().encode();
        encoded.truncate(encoded.len() - 1);
        let err = Packet::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut encoded = sample_log_entry().encode();
        encoded[0] = 99;
        let err = Packet::decode(&encoded).unwrap_err();
        assert_eq!(err, CodecError::UnknownKind { kind: 99 });
    }

    #[test]
    fn unknown_level_rejected() {
        let mut encoded = sample_log_entry().encode();
        // Level is the first body field.
        encoded[ENVELOPE_SIZE] = 200;
        let err = Packet::decode(&encoded).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownOrdinal { field: "level", .. }
        ));
    }

    #[test]
    fn oversized_declared_length_rejected() {
        let mut encoded = sample_log_entry().encode();
        // Declare one byte more than the body carries.
        let declared = (encoded.len() - ENVELOPE_SIZE + 1) as u32;
        encoded[2..6].copy_from_slice(&declared.to_le_bytes());
        let err = Packet::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn trailing_body_bytes_rejected() {
        let mut encoded = Packet::control_command(1, ControlCommand::default()).encode();
        encoded.push(0);
        let declared = (encoded.len() - ENVELOPE_SIZE) as u32;
        encoded[2..6].copy_from_slice(&declared.to_le_bytes());
        let err = Packet::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::BodyLengthMismatch { .. }));
    }

    #[test]
    fn decode_all_reads_a_sequence() {
        let mut stream = Vec::new();
        let packets = vec![
            sample_log_entry(),
            Packet::watch(
                Level::Message,
                2,
                Watch {
                    name: "w".into(),
                    value: "v".into(),
                    watch_type: WatchType::String,
                },
            ),
        ];
        for packet in &packets {
            packet.encode_into(&mut stream);
        }
        assert_eq!(Packet::decode_all(&stream).unwrap(), packets);
    }

    #[test]
    fn file_header_plaintext_roundtrip() {
        let header = FileHeader::plaintext();
        let encoded = header.encode();
        assert_eq!(encoded, b"SILF");
        let (decoded, consumed) = FileHeader::read_from(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn file_header_encrypted_roundtrip() {
        let header = FileHeader::encrypted([7u8; FILE_IV_LEN]);
        let encoded = header.encode();
        assert_eq!(&encoded[..4], b"SILE");
        assert_eq!(encoded.len(), 20);
        let (decoded, consumed) = FileHeader::read_from(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(consumed, 20);
    }

    #[test]
    fn file_header_bad_magic_rejected() {
        let err = FileHeader::read_from(b"XXXX....").unwrap_err();
        assert!(matches!(err, CodecError::InvalidMagic { .. }));
    }

    #[test]
    fn file_header_truncated_iv_rejected() {
        let err = FileHeader::read_from(b"SILE1234").unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
