//! Stream addressing: where an event lives and at which position

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel offset meaning "nothing applied yet" / "before the first event"
pub const NO_OFFSET: i64 = -1;

/// Identifies one stream: `(stream_type, stream_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamAddress {
    #[serde(rename = "streamType")]
    pub stream_type: String,
    #[serde(rename = "streamId")]
    pub stream_id: String,
}

impl StreamAddress {
    pub fn new(stream_type: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            stream_type: stream_type.into(),
            stream_id: stream_id.into(),
        }
    }

    /// Cursor pointing at `offset` within this stream
    pub fn at(&self, offset: i64) -> StreamCursor {
        StreamCursor {
            address: self.clone(),
            offset,
        }
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream_type, self.stream_id)
    }
}

/// Position of an event inside a stream
///
/// Offsets of real events start at 1 and are contiguous per stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamCursor {
    #[serde(flatten)]
    pub address: StreamAddress,
    pub offset: i64,
}

impl StreamCursor {
    pub fn new(stream_type: impl Into<String>, stream_id: impl Into<String>, offset: i64) -> Self {
        StreamAddress::new(stream_type, stream_id).at(offset)
    }

    /// Cursor for the event right after this one
    pub fn next(&self) -> Self {
        self.address.at(self.offset + 1)
    }
}

impl fmt::Display for StreamCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.offset)
    }
}

/// Identifies one view (projection) over one stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewAddress {
    #[serde(rename = "viewName")]
    pub view_name: String,
    #[serde(flatten)]
    pub stream: StreamAddress,
}

impl ViewAddress {
    pub fn new(view_name: impl Into<String>, stream: StreamAddress) -> Self {
        Self {
            view_name: view_name.into(),
            stream,
        }
    }
}

impl fmt::Display for ViewAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.view_name, self.stream)
    }
}
