use bytes::Bytes;
use redis_protocol::resp2::{decode::decode_bytes_mut, encode::extend_encode, types::BytesFrame};

/// Store reply type (re-export from redis-protocol crate)
pub type Reply = BytesFrame;

/// Commands issued against a store during a migration run
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select {
        index: String,
    },
    Keys {
        pattern: String,
    },
    Type {
        key: Bytes,
    },
    HGetAll {
        key: Bytes,
    },
    HMSet {
        key: Bytes,
        field_values: Vec<(Bytes, Bytes)>,
    },
    Ttl {
        key: Bytes,
    },
    HExpire {
        key: Bytes,
        seconds: i64,
    },
}

impl Command {
    /// Get the wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Select { .. } => "SELECT",
            Command::Keys { .. } => "KEYS",
            Command::Type { .. } => "TYPE",
            Command::HGetAll { .. } => "HGETALL",
            Command::HMSet { .. } => "HMSET",
            Command::Ttl { .. } => "TTL",
            Command::HExpire { .. } => "HEXPIRE",
        }
    }

    /// Build the request frame: an array of bulk strings
    pub fn to_frame(&self) -> Reply {
        let mut parts = vec![BytesFrame::BulkString(Bytes::from_static(
            self.name().as_bytes(),
        ))];

        match self {
            Command::Select { index } => {
                parts.push(BytesFrame::BulkString(index.clone().into_bytes().into()));
            }
            Command::Keys { pattern } => {
                parts.push(BytesFrame::BulkString(pattern.clone().into_bytes().into()));
            }
            Command::Type { key } | Command::HGetAll { key } | Command::Ttl { key } => {
                parts.push(BytesFrame::BulkString(key.clone()));
            }
            Command::HMSet { key, field_values } => {
                parts.push(BytesFrame::BulkString(key.clone()));
                for (field, value) in field_values {
                    parts.push(BytesFrame::BulkString(field.clone()));
                    parts.push(BytesFrame::BulkString(value.clone()));
                }
            }
            Command::HExpire { key, seconds } => {
                parts.push(BytesFrame::BulkString(key.clone()));
                parts.push(BytesFrame::BulkString(
                    seconds.to_string().into_bytes().into(),
                ));
            }
        }

        BytesFrame::Array(parts)
    }
}

/// Parse error types
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Incomplete data")]
    Incomplete,
    #[error("Invalid protocol: {0}")]
    Invalid(String),
}

/// Reply shape errors; every reply is checked against the variant its command expects
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("store returned error: {0}")]
    Store(String),
    #[error("expected {expected} reply, got {actual}")]
    Unexpected {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("expected OK acknowledgement, got '{0}'")]
    NotOk(String),
    #[error("field/value list has odd length {0}")]
    OddPairList(usize),
}

/// Parse a single RESP message and return both the parsed value and remaining bytes
pub fn parse_resp_with_remaining(input: &[u8]) -> Result<(Reply, &[u8]), ParseError> {
    let mut bytes_mut = bytes::BytesMut::from(input);

    match decode_bytes_mut(&mut bytes_mut) {
        Ok(Some((frame, consumed, _))) => {
            let remaining = &input[consumed..];
            Ok((frame, remaining))
        }
        Ok(None) => Err(ParseError::Incomplete),
        Err(e) => Err(ParseError::Invalid(format!("Parse error: {:?}", e))),
    }
}

/// Serialize RESP value to bytes using redis-protocol crate
pub fn serialize_frame(frame: &BytesFrame) -> Bytes {
    let mut buf = bytes::BytesMut::new();
    extend_encode(&mut buf, frame, false).expect("Failed to encode frame");
    buf.freeze()
}

/// Expect the literal OK acknowledgement
pub fn expect_ok(reply: Reply) -> Result<(), ReplyError> {
    let text = expect_string(reply)?;
    if text == "OK" {
        Ok(())
    } else {
        Err(ReplyError::NotOk(text))
    }
}

/// Expect a textual reply (simple or bulk string)
pub fn expect_string(reply: Reply) -> Result<String, ReplyError> {
    match reply {
        BytesFrame::SimpleString(data) => Ok(String::from_utf8_lossy(&data).to_string()),
        BytesFrame::BulkString(data) => Ok(String::from_utf8_lossy(&data).to_string()),
        BytesFrame::Error(message) => Err(ReplyError::Store(message.to_string())),
        other => Err(ReplyError::Unexpected {
            expected: "string",
            actual: reply_kind(&other),
        }),
    }
}

/// Expect an integer reply
pub fn expect_integer(reply: Reply) -> Result<i64, ReplyError> {
    match reply {
        BytesFrame::Integer(value) => Ok(value),
        BytesFrame::Error(message) => Err(ReplyError::Store(message.to_string())),
        other => Err(ReplyError::Unexpected {
            expected: "integer",
            actual: reply_kind(&other),
        }),
    }
}

/// Expect an array of keys
pub fn expect_key_list(reply: Reply) -> Result<Vec<Bytes>, ReplyError> {
    let elements = expect_array(reply)?;
    let mut keys = Vec::with_capacity(elements.len());
    for element in elements {
        keys.push(expect_bytes(element)?);
    }
    Ok(keys)
}

/// Expect a flat field/value array and pair it up; odd length is a decode error
pub fn expect_field_pairs(reply: Reply) -> Result<Vec<(Bytes, Bytes)>, ReplyError> {
    let elements = expect_array(reply)?;
    if elements.len() % 2 != 0 {
        return Err(ReplyError::OddPairList(elements.len()));
    }

    let mut pairs = Vec::with_capacity(elements.len() / 2);
    let mut iter = elements.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        pairs.push((expect_bytes(field)?, expect_bytes(value)?));
    }
    Ok(pairs)
}

fn expect_array(reply: Reply) -> Result<Vec<Reply>, ReplyError> {
    match reply {
        BytesFrame::Array(elements) => Ok(elements),
        BytesFrame::Error(message) => Err(ReplyError::Store(message.to_string())),
        other => Err(ReplyError::Unexpected {
            expected: "array",
            actual: reply_kind(&other),
        }),
    }
}

/// Extract bytes from RESP value
fn expect_bytes(value: Reply) -> Result<Bytes, ReplyError> {
    match value {
        BytesFrame::BulkString(data) => Ok(data),
        BytesFrame::SimpleString(data) => Ok(data),
        other => Err(ReplyError::Unexpected {
            expected: "bulk string",
            actual: reply_kind(&other),
        }),
    }
}

/// Human-readable name of a reply variant, for logs and shape errors
pub fn reply_kind(frame: &Reply) -> &'static str {
    match frame {
        BytesFrame::SimpleString(_) => "simple string",
        BytesFrame::Error(_) => "error",
        BytesFrame::Integer(_) => "integer",
        BytesFrame::BulkString(_) => "bulk string",
        BytesFrame::Array(_) => "array",
        BytesFrame::Null => "null",
    }
}
