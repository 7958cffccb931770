/// A reply in the store's native shape, before it is decoded against the
/// request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReply {
    Nil,
    Integer(i64),
    Bulk(Vec<u8>),
    Status(String),
    Error(String),
    Array(Vec<RawReply>),
}

impl RawReply {
    pub fn ok() -> Self {
        RawReply::Status("OK".into())
    }

    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        RawReply::Bulk(bytes.into())
    }

    pub fn bulk_i64(value: i64) -> Self {
        RawReply::Bulk(value.to_le_bytes().to_vec())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, RawReply::Nil)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawReply::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            RawReply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// An empty array is reported as `None`, like a nil reply.
    pub fn as_non_empty_array(&self) -> Option<&[RawReply]> {
        match self {
            RawReply::Array(items) if !items.is_empty() => Some(items),
            _ => None,
        }
    }
}

impl From<Option<Vec<u8>>> for RawReply {
    fn from(value: Option<Vec<u8>>) -> Self {
        value.map(RawReply::Bulk).unwrap_or(RawReply::Nil)
    }
}
