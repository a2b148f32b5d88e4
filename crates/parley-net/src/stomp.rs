//! STOMP 1.2 frame codec.
//!
//! One frame travels in one WebSocket text message:
//!
//! ```text
//! COMMAND
//! key:value
//!
//! body^@
//! ```
//!
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every frame except
//! CONNECT and CONNECTED. A bare EOL is a heart-beat and decodes to nothing.

use std::fmt;
use std::str::FromStr;

use parley_shared::constants::STOMP_VERSION;

use crate::error::StompError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED carry their headers unescaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "CONNECTED" => Self::Connected,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(StompError::UnknownCommand(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated keys are kept; lookups return the
    /// first occurrence.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // -- common frames ------------------------------------------------------

    pub fn connect(host: &str, access_token: &str) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", STOMP_VERSION)
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
            .with_header("Authorization", access_token)
    }

    pub fn connected() -> Self {
        Self::new(Command::Connected)
            .with_header("version", STOMP_VERSION)
            .with_header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// SEND with a JSON body.
    pub fn send(destination: &str, json: String, reply_to: Option<&str>) -> Self {
        let mut frame = Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json");
        if let Some(reply_to) = reply_to {
            frame = frame.with_header("reply-to", reply_to);
        }
        frame.with_body(json)
    }

    pub fn message(subscription: &str, destination: &str, message_id: &str, json: String) -> Self {
        Self::new(Command::Message)
            .with_header("subscription", subscription)
            .with_header("destination", destination)
            .with_header("message-id", message_id)
            .with_header("content-type", "application/json")
            .with_body(json)
    }

    pub fn error(message: &str) -> Self {
        Self::new(Command::Error).with_header("message", message)
    }

    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    // -- codec --------------------------------------------------------------

    /// Serialize to wire text. A `content-length` header is added for
    /// non-empty bodies unless one is already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');

        for (key, value) in &self.headers {
            push_header_part(&mut out, key, escape);
            out.push(':');
            push_header_part(&mut out, value, escape);
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Heart-beats yield `Ok(None)`.
    pub fn decode(text: &str) -> Result<Option<Self>, StompError> {
        if text.is_empty() {
            return Err(StompError::Empty);
        }
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(None);
        }

        let mut pos = 0;
        let mut lines = Vec::new();
        loop {
            let end = text[pos..]
                .find('\n')
                .map(|i| i + pos)
                .ok_or(StompError::Unterminated)?;
            let line = text[pos..end].trim_end_matches('\r');
            pos = end + 1;
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }

        let mut lines = lines.into_iter();
        let command: Command = lines.next().ok_or(StompError::Empty)?.parse()?;
        let unescape_values = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::BadHeader(line.to_string()))?;
            if unescape_values {
                headers.push((unescape(key)?, unescape(value)?));
            } else {
                headers.push((key.to_string(), value.to_string()));
            }
        }

        let rest = &text[pos..];
        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| v.trim());

        let body = match content_length {
            Some(raw) => {
                let len: usize = raw
                    .parse()
                    .map_err(|_| StompError::BadContentLength(raw.to_string()))?;
                if rest.len() <= len {
                    return Err(StompError::Unterminated);
                }
                let body = rest
                    .get(..len)
                    .ok_or_else(|| StompError::BadContentLength(raw.to_string()))?;
                if rest.as_bytes()[len] != 0 {
                    return Err(StompError::Unterminated);
                }
                body
            }
            None => {
                let end = rest.find('\0').ok_or(StompError::Unterminated)?;
                &rest[..end]
            }
        };

        Ok(Some(Self {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn push_header_part(out: &mut String, s: &str, escape: bool) {
    if !escape {
        out.push_str(s);
        return;
    }
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
}

fn unescape(s: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::BadEscape),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_send_frame() {
        let frame = Frame::send(
            "/app/room/7/read",
            r#"{"messageIds":[5]}"#.into(),
            Some("/topic/r"),
        );
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/room/7/read\ncontent-type:application/json\n\
             reply-to:/topic/r\ncontent-length:18\n\n{\"messageIds\":[5]}\0"
        );
    }

    #[test]
    fn test_decode_message_frame() {
        let wire = "MESSAGE\nsubscription:sub-1\ndestination:/topic/room/7\n\
                    message-id:m1\n\n{\"id\":5}\0\n";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-1"));
        assert_eq!(frame.get("destination"), Some("/topic/room/7"));
        assert_eq!(frame.body, r#"{"id":5}"#);
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::new(Command::Message)
            .with_header("note", "a:b\\c\nd\re")
            .with_body("x");
        let wire = frame.encode();
        assert!(wire.contains("note:a\\cb\\\\c\\nd\\re\n"));

        let back = Frame::decode(&wire).unwrap().unwrap();
        assert_eq!(back.get("note"), Some("a:b\\c\nd\re"));
    }

    #[test]
    fn test_connect_headers_not_escaped() {
        let frame = Frame::connect("localhost", "tok:en");
        let wire = frame.encode();
        assert!(wire.contains("Authorization:tok:en\n"));

        let back = Frame::decode(&wire).unwrap().unwrap();
        assert_eq!(back.get("Authorization"), Some("tok:en"));
        assert_eq!(back.get("accept-version"), Some("1.2"));
    }

    #[test]
    fn test_content_length_allows_nul_in_body() {
        let wire = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_crlf_and_heartbeats() {
        assert_eq!(Frame::decode("\n").unwrap(), None);
        assert_eq!(Frame::decode("\r\n\r\n").unwrap(), None);

        let frame = Frame::decode("\nCONNECTED\r\nversion:1.2\r\n\r\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let frame = Frame::decode("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap().unwrap();
        assert_eq!(frame.get("foo"), Some("1"));
        assert_eq!(frame.headers.len(), 2);
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(Frame::decode(""), Err(StompError::Empty));
        assert_eq!(
            Frame::decode("HELLO\n\n\0"),
            Err(StompError::UnknownCommand("HELLO".into()))
        );
        assert_eq!(
            Frame::decode("SEND\nnocolon\n\n\0"),
            Err(StompError::BadHeader("nocolon".into()))
        );
        assert_eq!(
            Frame::decode("SEND\nk:\\x\n\n\0"),
            Err(StompError::BadEscape)
        );
        assert_eq!(Frame::decode("SEND\n\nbody"), Err(StompError::Unterminated));
        assert_eq!(Frame::decode("SEND"), Err(StompError::Unterminated));
        assert_eq!(
            Frame::decode("SEND\ncontent-length:x\n\n\0"),
            Err(StompError::BadContentLength("x".into()))
        );
        assert_eq!(
            Frame::decode("SEND\ncontent-length:9\n\nshort\0"),
            Err(StompError::Unterminated)
        );
    }
}
