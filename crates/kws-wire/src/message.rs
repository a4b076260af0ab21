//! Wire protocol message types.
//!
//! Requests and replies are single semicolon-delimited text messages:
//!
//! ```text
//! PING;<identity>                                  -> PONG
//! MSG;<identity>;<timestamp>;<text>                -> MSG_RECEIVED
//! REQ;<sender>;<target>;<command>[;<payload...>]   -> command-specific
//! ```
//!
//! The last field of `MSG` and the payload of `REQ` may contain `;`
//! themselves; everything after the fixed fields is rejoined on decode.

use std::fmt;

/// Field separator.
pub const SEPARATOR: char = ';';

/// Sender recorded for a `PING` that names nobody.
pub const UNKNOWN_SENDER: &str = "unknown";

/// `REQ` sub-command, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReqCommand {
    /// Ask the peer for its identity.
    Info,
    /// Push a serialized directory for the peer to merge.
    AddList,
    /// Ask the peer for its serialized directory.
    List,
    /// Anything else, upper-cased.
    Other(String),
}

impl ReqCommand {
    /// Parse a command field.
    pub fn parse(s: &str) -> Self {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "INFO" => ReqCommand::Info,
            "ADDLIST" => ReqCommand::AddList,
            "LIST" => ReqCommand::List,
            _ => ReqCommand::Other(upper),
        }
    }

    /// Wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            ReqCommand::Info => "INFO",
            ReqCommand::AddList => "ADDLIST",
            ReqCommand::List => "LIST",
            ReqCommand::Other(s) => s,
        }
    }
}

impl fmt::Display for ReqCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness probe.
    Ping { sender: String },
    /// Short text message.
    Msg {
        sender: String,
        timestamp: String,
        text: String,
    },
    /// Addressed request for `target`.
    Req {
        sender: String,
        target: String,
        command: ReqCommand,
        payload: String,
    },
}

/// Why a request could not be decoded. Each maps to a rejection reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `REQ` with fewer than four fields.
    InvalidReq,
    /// `MSG` with fewer than four fields.
    InvalidMsg,
    /// Field 0 names no known request kind.
    UnknownKind(String),
}

impl DecodeError {
    /// The reply sent back for this error.
    pub fn reply(&self) -> Reply {
        match self {
            DecodeError::InvalidReq => Reply::InvalidReqFormat,
            DecodeError::InvalidMsg => Reply::InvalidMsgFormat,
            DecodeError::UnknownKind(_) => Reply::UnknownCommand,
        }
    }
}

impl Request {
    /// Decode a raw request. Trailing line breaks are ignored.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();

        match parts[0] {
            "PING" => Ok(Request::Ping {
                sender: parts.get(1).unwrap_or(&UNKNOWN_SENDER).to_string(),
            }),
            "MSG" => {
                if parts.len() < 4 {
                    return Err(DecodeError::InvalidMsg);
                }
                Ok(Request::Msg {
                    sender: parts[1].to_string(),
                    timestamp: parts[2].to_string(),
                    text: parts[3..].join(";"),
                })
            }
            "REQ" => {
                if parts.len() < 4 {
                    return Err(DecodeError::InvalidReq);
                }
                Ok(Request::Req {
                    sender: parts[1].to_string(),
                    target: parts[2].to_string(),
                    command: ReqCommand::parse(parts[3]),
                    payload: parts[4..].join(";"),
                })
            }
            other => Err(DecodeError::UnknownKind(other.to_string())),
        }
    }

    /// Encode for sending.
    pub fn encode(&self) -> String {
        match self {
            Request::Ping { sender } => format!("PING;{sender}"),
            Request::Msg {
                sender,
                timestamp,
                text,
            } => format!("MSG;{sender};{timestamp};{text}"),
            Request::Req {
                sender,
                target,
                command,
                payload,
            } => {
                if payload.is_empty() {
                    format!("REQ;{sender};{target};{command}")
                } else {
                    format!("REQ;{sender};{target};{command};{payload}")
                }
            }
        }
    }

    /// Short name of the request kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ping { .. } => "PING",
            Request::Msg { .. } => "MSG",
            Request::Req { .. } => "REQ",
        }
    }
}

/// Every reply the dispatcher can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to `PING`.
    Pong,
    /// `MSG` was accepted.
    MsgReceived,
    /// `REQ` was addressed to another identity.
    WrongTarget,
    /// `INFO;<identity>`.
    Info(String),
    /// `ADDLIST` payload was merged.
    AddListReceived,
    /// `ADDLIST` payload could not be persisted.
    AddListFailed,
    /// `ADDLIST` without payload.
    NoPayload,
    /// `LIST;<serialized directory>`.
    List(String),
    /// `REQ` with an unrecognised command.
    UnknownReqCommand,
    /// `REQ` with fewer than four fields.
    InvalidReqFormat,
    /// `MSG` with fewer than four fields.
    InvalidMsgFormat,
    /// Unrecognised request kind.
    UnknownCommand,
}

impl Reply {
    /// Encode for sending.
    pub fn encode(&self) -> String {
        match self {
            Reply::Pong => "PONG".to_string(),
            Reply::MsgReceived => "MSG_RECEIVED".to_string(),
            Reply::WrongTarget => "WRONG_TARGET".to_string(),
            Reply::Info(identity) => format!("INFO;{identity}"),
            Reply::AddListReceived => "ADDLIST_RECEIVED".to_string(),
            Reply::AddListFailed => "ADDLIST_FAILED".to_string(),
            Reply::NoPayload => "NO_PAYLOAD".to_string(),
            Reply::List(directory) => format!("LIST;{directory}"),
            Reply::UnknownReqCommand => "UNBEKANNT_COMMAND".to_string(),
            Reply::InvalidReqFormat => "INVALID_REQ_FORMAT".to_string(),
            Reply::InvalidMsgFormat => "INVALID_MSG_FORMAT".to_string(),
            Reply::UnknownCommand => "UNKNOWN_COMMAND".to_string(),
        }
    }

    /// Interpret a received reply. Returns `None` for unrecognised text.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if let Some(identity) = raw.strip_prefix("INFO;") {
            return Some(Reply::Info(identity.to_string()));
        }
        if let Some(directory) = raw.strip_prefix("LIST;") {
            return Some(Reply::List(directory.to_string()));
        }
        match raw {
            "PONG" => Some(Reply::Pong),
            "MSG_RECEIVED" => Some(Reply::MsgReceived),
            "WRONG_TARGET" => Some(Reply::WrongTarget),
            "ADDLIST_RECEIVED" => Some(Reply::AddListReceived),
            "ADDLIST_FAILED" => Some(Reply::AddListFailed),
            "NO_PAYLOAD" => Some(Reply::NoPayload),
            "UNBEKANNT_COMMAND" => Some(Reply::UnknownReqCommand),
            "INVALID_REQ_FORMAT" => Some(Reply::InvalidReqFormat),
            "INVALID_MSG_FORMAT" => Some(Reply::InvalidMsgFormat),
            "UNKNOWN_COMMAND" => Some(Reply::UnknownCommand),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ping() {
        assert_eq!(
            Request::decode("PING;abc").unwrap(),
            Request::Ping {
                sender: "abc".to_string()
            }
        );
        assert_eq!(
            Request::decode("PING").unwrap(),
            Request::Ping {
                sender: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_decode_msg_rejoins_text() {
        let req = Request::decode("MSG;abc;2024-06-01 10:00:00;hello; world;!\n").unwrap();
        assert_eq!(
            req,
            Request::Msg {
                sender: "abc".to_string(),
                timestamp: "2024-06-01 10:00:00".to_string(),
                text: "hello; world;!".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_msg_too_short() {
        assert_eq!(
            Request::decode("MSG;abc;2024-06-01 10:00:00"),
            Err(DecodeError::InvalidMsg)
        );
    }

    #[test]
    fn test_decode_req_with_payload() {
        let req = Request::decode("REQ;S;T;addlist;a;A1;t;A;h;online|\nb;B2;t;B;h;offline|").unwrap();
        match req {
            Request::Req {
                sender,
                target,
                command,
                payload,
            } => {
                assert_eq!(sender, "S");
                assert_eq!(target, "T");
                assert_eq!(command, ReqCommand::AddList);
                assert_eq!(payload, "a;A1;t;A;h;online|\nb;B2;t;B;h;offline|");
            }
            other => panic!("Expected Req, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_req_too_short() {
        assert_eq!(Request::decode("REQ;S;T"), Err(DecodeError::InvalidReq));
        assert_eq!(
            DecodeError::InvalidReq.reply().encode(),
            "INVALID_REQ_FORMAT"
        );
    }

    #[test]
    fn test_decode_unknown_kind() {
        let err = Request::decode("HELLO;x").unwrap_err();
        assert_eq!(err, DecodeError::UnknownKind("HELLO".to_string()));
        assert_eq!(err.reply().encode(), "UNKNOWN_COMMAND");
        // Kinds are case-sensitive.
        assert!(Request::decode("ping;x").is_err());
    }

    #[test]
    fn test_command_case_and_other() {
        assert_eq!(ReqCommand::parse("info"), ReqCommand::Info);
        assert_eq!(ReqCommand::parse("List"), ReqCommand::List);
        assert_eq!(
            ReqCommand::parse("reboot"),
            ReqCommand::Other("REBOOT".to_string())
        );
    }

    #[test]
    fn test_encode_requests() {
        let req = Request::Req {
            sender: "S".to_string(),
            target: "T".to_string(),
            command: ReqCommand::List,
            payload: String::new(),
        };
        assert_eq!(req.encode(), "REQ;S;T;LIST");

        let req = Request::Req {
            sender: "S".to_string(),
            target: "T".to_string(),
            command: ReqCommand::AddList,
            payload: "x;y".to_string(),
        };
        assert_eq!(req.encode(), "REQ;S;T;ADDLIST;x;y");
        assert_eq!(Request::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn test_reply_spellings() {
        assert_eq!(Reply::UnknownReqCommand.encode(), "UNBEKANNT_COMMAND");
        assert_eq!(Reply::Info("me".into()).encode(), "INFO;me");
        assert_eq!(Reply::List(String::new()).encode(), "LIST;");
    }

    #[test]
    fn test_reply_parse() {
        assert_eq!(Reply::parse("PONG"), Some(Reply::Pong));
        assert_eq!(Reply::parse("INFO;abc"), Some(Reply::Info("abc".into())));
        assert_eq!(
            Reply::parse("LIST;a;b;c;d;e;f|"),
            Some(Reply::List("a;b;c;d;e;f|".into()))
        );
        assert_eq!(Reply::parse("WRONG_TARGET"), Some(Reply::WrongTarget));
        assert_eq!(Reply::parse("PONG!"), None);
    }
}
