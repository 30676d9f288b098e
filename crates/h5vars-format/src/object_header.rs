//! Version 2 object headers: writer and parser.
//!
//! A v2 header is `OHDR`, version, flags, optional timestamps and attribute
//! phase-change values, the chunk #0 size (width chosen by flag bits 0-1),
//! the messages, and a lookup3 checksum. Continuation chunks use the `OCHK`
//! signature and carry their own checksum.

use crate::bytes::Reader;
use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;
use crate::message_type::MessageType;

const OHDR: &[u8; 4] = b"OHDR";
const OCHK: &[u8; 4] = b"OCHK";

const MAX_CONTINUATIONS: usize = 64;

const FLAG_CREATION_ORDER_TRACKED: u8 = 0x04;
const FLAG_PHASE_CHANGE_STORED: u8 = 0x10;
const FLAG_TIMES_STORED: u8 = 0x20;

/// Header message flag: the message is constant.
pub const MSG_FLAG_CONSTANT: u8 = 0x01;
/// Header message flag: fail to open if the message type is unknown.
pub const MSG_FLAG_FAIL_IF_UNKNOWN: u8 = 0x80;

/// Access, modification, change and birth times (seconds since the epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTimes {
    pub access: u32,
    pub modification: u32,
    pub change: u32,
    pub birth: u32,
}

impl ObjectTimes {
    /// All four times set to `seconds`.
    pub fn uniform(seconds: u32) -> Self {
        Self {
            access: seconds,
            modification: seconds,
            change: seconds,
            birth: seconds,
        }
    }
}

/// Builds a v2 object header.
#[derive(Debug, Default)]
pub struct ObjectHeaderWriter {
    messages: Vec<(MessageType, Vec<u8>, u8)>,
    times: Option<ObjectTimes>,
}

impl ObjectHeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store object times in the header prefix.
    pub fn with_times(mut self, times: ObjectTimes) -> Self {
        self.times = Some(times);
        self
    }

    pub fn add_message(&mut self, msg_type: MessageType, data: Vec<u8>) {
        self.messages.push((msg_type, data, 0));
    }

    pub fn add_message_with_flags(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push((msg_type, data, flags));
    }

    /// Serialize header prefix, messages and checksum.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut body = Vec::new();
        for (msg_type, data, msg_flags) in &self.messages {
            let size = u16::try_from(data.len())
                .map_err(|_| FormatError::MessageTooLarge(data.len()))?;
            body.push(msg_type.to_u8());
            body.extend_from_slice(&size.to_le_bytes());
            body.push(*msg_flags);
            body.extend_from_slice(data);
        }

        let (size_flag, size_width) = match body.len() {
            n if n <= u8::MAX as usize => (0x00u8, 1usize),
            n if n <= u16::MAX as usize => (0x01, 2),
            n if n <= u32::MAX as usize => (0x02, 4),
            _ => (0x03, 8),
        };
        let mut flags = size_flag;
        if self.times.is_some() {
            flags |= FLAG_TIMES_STORED;
        }

        let mut buf = Vec::with_capacity(6 + 16 + size_width + body.len() + 4);
        buf.extend_from_slice(OHDR);
        buf.push(2);
        buf.push(flags);
        if let Some(t) = self.times {
            for v in [t.access, t.modification, t.change, t.birth] {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        let size_bytes = (body.len() as u64).to_le_bytes();
        buf.extend_from_slice(&size_bytes[..size_width]);
        buf.extend_from_slice(&body);

        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }
}

/// One message of a parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMessage {
    pub msg_type: MessageType,
    pub flags: u8,
    pub data: Vec<u8>,
}

/// A parsed v2 object header with continuation chunks resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub flags: u8,
    pub times: Option<ObjectTimes>,
    pub messages: Vec<HeaderMessage>,
}

impl ObjectHeader {
    /// Parse the header at `address` (already adjusted for the base address).
    pub fn parse(
        data: &[u8],
        address: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<Self, FormatError> {
        let mut r = Reader::at(data, address)?;
        if r.bytes(4)? != OHDR {
            return Err(FormatError::InvalidObjectHeaderSignature);
        }
        let version = r.u8()?;
        if version != 2 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let flags = r.u8()?;
        let times = if flags & FLAG_TIMES_STORED != 0 {
            Some(ObjectTimes {
                access: r.u32()?,
                modification: r.u32()?,
                change: r.u32()?,
                birth: r.u32()?,
            })
        } else {
            None
        };
        if flags & FLAG_PHASE_CHANGE_STORED != 0 {
            r.skip(4)?;
        }
        let chunk_size = r.uint(1 << (flags & 0x03))? as usize;
        let body_start = r.position();
        let body = r.bytes(chunk_size)?;
        verify_checksum(data, address, r.position(), r.u32()?, "object header")?;

        let ctx = ChunkContext {
            creation_order: flags & FLAG_CREATION_ORDER_TRACKED != 0,
            offset_size,
            length_size,
        };
        let mut messages = Vec::new();
        let mut pending = ctx.parse_messages(body, &mut messages)?;
        log::trace!(
            "object header at {address:#x}: {} body bytes from {body_start:#x}",
            body.len()
        );

        let mut followed = 0usize;
        while let Some((chunk_addr, chunk_len)) = pending.pop() {
            followed += 1;
            if followed > MAX_CONTINUATIONS {
                return Err(FormatError::TooManyContinuations(MAX_CONTINUATIONS));
            }
            let more = ctx.parse_continuation(data, chunk_addr as usize, chunk_len as usize, &mut messages)?;
            pending.extend(more);
        }
        Ok(Self {
            flags,
            times,
            messages,
        })
    }

    /// First message of the given type.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// All messages of the given type, in header order.
    pub fn find_all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }
}

fn verify_checksum(
    data: &[u8],
    start: usize,
    end: usize,
    stored: u32,
    structure: &'static str,
) -> Result<(), FormatError> {
    let computed = jenkins_lookup3(&data[start..end]);
    if computed != stored {
        return Err(FormatError::ChecksumMismatch {
            structure,
            stored,
            computed,
        });
    }
    Ok(())
}

struct ChunkContext {
    creation_order: bool,
    offset_size: u8,
    length_size: u8,
}

impl ChunkContext {
    /// Parse messages from one chunk body. Continuation messages are not
    /// kept; their targets are returned for the caller to follow.
    fn parse_messages(
        &self,
        body: &[u8],
        out: &mut Vec<HeaderMessage>,
    ) -> Result<Vec<(u64, u64)>, FormatError> {
        let header_len = if self.creation_order { 6 } else { 4 };
        let mut r = Reader::new(body);
        let mut continuations = Vec::new();
        // Anything shorter than a message header at the end is a gap.
        while r.remaining() >= header_len {
            let msg_type = MessageType::from_u8(r.u8()?);
            let size = r.u16()? as usize;
            let flags = r.u8()?;
            if self.creation_order {
                r.skip(2)?;
            }
            let payload = r.bytes(size)?;
            match msg_type {
                MessageType::Nil => {}
                MessageType::Unknown(id) if flags & MSG_FLAG_FAIL_IF_UNKNOWN != 0 => {
                    return Err(FormatError::UnsupportedMessage(id.into()));
                }
                MessageType::Continuation => {
                    let mut c = Reader::new(payload);
                    let address = c.uint(self.offset_size)?;
                    let length = c.uint(self.length_size)?;
                    continuations.push((address, length));
                }
                _ => out.push(HeaderMessage {
                    msg_type,
                    flags,
                    data: payload.to_vec(),
                }),
            }
        }
        Ok(continuations)
    }

    fn parse_continuation(
        &self,
        data: &[u8],
        address: usize,
        length: usize,
        out: &mut Vec<HeaderMessage>,
    ) -> Result<Vec<(u64, u64)>, FormatError> {
        if length < 8 {
            return Err(FormatError::UnexpectedEof {
                expected: 8,
                available: length,
            });
        }
        let mut r = Reader::at(data, address)?;
        if r.bytes(4)? != OCHK {
            return Err(FormatError::InvalidObjectHeaderSignature);
        }
        let body = r.bytes(length - 8)?;
        verify_checksum(data, address, r.position(), r.u32()?, "continuation chunk")?;
        self.parse_messages(body, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_writer() -> ObjectHeaderWriter {
        let mut w = ObjectHeaderWriter::new();
        w.add_message_with_flags(MessageType::Datatype, vec![1, 2, 3], MSG_FLAG_CONSTANT);
        w.add_message(MessageType::Dataspace, vec![4; 10]);
        w
    }

    #[test]
    fn writer_output_parses() {
        let bytes = sample_writer().serialize().unwrap();
        assert_eq!(&bytes[..4], b"OHDR");
        let oh = ObjectHeader::parse(&bytes, 0, 8, 8).unwrap();
        assert_eq!(oh.times, None);
        assert_eq!(oh.messages.len(), 2);
        let dt = oh.find(MessageType::Datatype).unwrap();
        assert_eq!(dt.flags, MSG_FLAG_CONSTANT);
        assert_eq!(dt.data, vec![1, 2, 3]);
        assert_eq!(oh.find(MessageType::Dataspace).unwrap().data.len(), 10);
        assert!(oh.find(MessageType::DataLayout).is_none());
    }

    #[test]
    fn times_in_prefix() {
        let times = ObjectTimes::uniform(1_700_000_000);
        let bytes = sample_writer().with_times(times).serialize().unwrap();
        let oh = ObjectHeader::parse(&bytes, 0, 8, 8).unwrap();
        assert_eq!(oh.flags & FLAG_TIMES_STORED, FLAG_TIMES_STORED);
        assert_eq!(oh.times, Some(times));
        assert_eq!(oh.messages.len(), 2);
    }

    #[test]
    fn wide_chunk_size_field() {
        let mut w = ObjectHeaderWriter::new();
        w.add_message(MessageType::Attribute, vec![0xAB; 300]);
        let bytes = w.serialize().unwrap();
        assert_eq!(bytes[5] & 0x03, 0x01);
        let oh = ObjectHeader::parse(&bytes, 0, 8, 8).unwrap();
        assert_eq!(oh.messages[0].data.len(), 300);
    }

    #[test]
    fn oversized_message_rejected() {
        let mut w = ObjectHeaderWriter::new();
        w.add_message(MessageType::Attribute, vec![0; 70_000]);
        assert_eq!(w.serialize(), Err(FormatError::MessageTooLarge(70_000)));
    }

    #[test]
    fn checksum_guards_header() {
        let mut bytes = sample_writer().serialize().unwrap();
        bytes[9] ^= 0x40;
        assert!(matches!(
            ObjectHeader::parse(&bytes, 0, 8, 8),
            Err(FormatError::ChecksumMismatch { structure: "object header", .. })
        ));
    }

    #[test]
    fn must_understand_unknown_message_fails() {
        let mut w = ObjectHeaderWriter::new();
        w.add_message_with_flags(MessageType::Unknown(0x30), vec![0; 4], MSG_FLAG_FAIL_IF_UNKNOWN);
        let bytes = w.serialize().unwrap();
        assert_eq!(
            ObjectHeader::parse(&bytes, 0, 8, 8),
            Err(FormatError::UnsupportedMessage(0x30))
        );
    }

    #[test]
    fn follows_continuation_chunk() {
        // Continuation block: OCHK + one dataspace message + checksum.
        let mut chunk = Vec::new();
        chunk.extend_from_slice(b"OCHK");
        chunk.extend_from_slice(&[0x01, 2, 0, 0, 0xAA, 0xBB]);
        let sum = jenkins_lookup3(&chunk);
        chunk.extend_from_slice(&sum.to_le_bytes());

        let mut w = ObjectHeaderWriter::new();
        let mut cont = Vec::new();
        // Prefix (7) + one 16-byte message (20) + checksum (4).
        let header_len = 31u64;
        cont.extend_from_slice(&header_len.to_le_bytes());
        cont.extend_from_slice(&(chunk.len() as u64).to_le_bytes());
        w.add_message(MessageType::Continuation, cont);
        let mut file = w.serialize().unwrap();
        assert_eq!(file.len() as u64, header_len);
        file.extend_from_slice(&chunk);

        let oh = ObjectHeader::parse(&file, 0, 8, 8).unwrap();
        assert_eq!(oh.messages.len(), 1);
        assert_eq!(oh.messages[0].msg_type, MessageType::Dataspace);
        assert_eq!(oh.messages[0].data, vec![0xAA, 0xBB]);
    }
}
