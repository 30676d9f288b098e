//! Header message type identifiers.

/// Header message types this crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Nil,
    Dataspace,
    LinkInfo,
    Datatype,
    FillValueOld,
    FillValue,
    Link,
    DataLayout,
    GroupInfo,
    FilterPipeline,
    Attribute,
    Continuation,
    SymbolTable,
    ModificationTime,
    /// Any other message type, with its raw id.
    Unknown(u8),
}

impl MessageType {
    pub fn from_u8(val: u8) -> Self {
        match val {
            0x00 => Self::Nil,
            0x01 => Self::Dataspace,
            0x02 => Self::LinkInfo,
            0x03 => Self::Datatype,
            0x04 => Self::FillValueOld,
            0x05 => Self::FillValue,
            0x06 => Self::Link,
            0x08 => Self::DataLayout,
            0x0A => Self::GroupInfo,
            0x0B => Self::FilterPipeline,
            0x0C => Self::Attribute,
            0x10 => Self::Continuation,
            0x11 => Self::SymbolTable,
            0x12 => Self::ModificationTime,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Nil => 0x00,
            Self::Dataspace => 0x01,
            Self::LinkInfo => 0x02,
            Self::Datatype => 0x03,
            Self::FillValueOld => 0x04,
            Self::FillValue => 0x05,
            Self::Link => 0x06,
            Self::DataLayout => 0x08,
            Self::GroupInfo => 0x0A,
            Self::FilterPipeline => 0x0B,
            Self::Attribute => 0x0C,
            Self::Continuation => 0x10,
            Self::SymbolTable => 0x11,
            Self::ModificationTime => 0x12,
            Self::Unknown(v) => v,
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Dataspace => "dataspace",
            Self::LinkInfo => "link info",
            Self::Datatype => "datatype",
            Self::FillValueOld => "old fill value",
            Self::FillValue => "fill value",
            Self::Link => "link",
            Self::DataLayout => "data layout",
            Self::GroupInfo => "group info",
            Self::FilterPipeline => "filter pipeline",
            Self::Attribute => "attribute",
            Self::Continuation => "continuation",
            Self::SymbolTable => "symbol table",
            Self::ModificationTime => "modification time",
            Self::Unknown(_) => "unknown",
        }
    }
}
