//! Store command and reply values
//!
//! Transport-neutral representation of one request/response pair on a
//! pipelined store connection.

use std::fmt;

use bytes::Bytes;

/// A single command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Binary-safe payload
    Bytes(Bytes),
    /// Text argument (keys, channels)
    Str(String),
    /// Integer argument (list bounds)
    Int(i64),
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// One outbound store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    args: Vec<Arg>,
}

impl Command {
    /// Create a command with no arguments
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `PUBLISH channel message`
    pub fn publish(channel: impl Into<String>, message: Bytes) -> Self {
        Self::new("PUBLISH").arg(channel.into()).arg(message)
    }

    /// `LPUSH key value`
    pub fn lpush(key: impl Into<String>, value: Bytes) -> Self {
        Self::new("LPUSH").arg(key.into()).arg(value)
    }

    /// `LTRIM key start stop`
    pub fn ltrim(key: impl Into<String>, start: i64, stop: i64) -> Self {
        Self::new("LTRIM").arg(key.into()).arg(start).arg(stop)
    }

    /// Command name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Command arguments
    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for arg in &self.args {
            match arg {
                Arg::Bytes(b) => write!(f, " <{} bytes>", b.len())?,
                Arg::Str(s) => write!(f, " {s}")?,
                Arg::Int(i) => write!(f, " {i}")?,
            }
        }
        Ok(())
    }
}

/// A reply read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Int(i64),
    Status(String),
    Data(Bytes),
    Array(Vec<Reply>),
    /// Reply kinds the relay never inspects, kept as their debug rendering
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltrim_args() {
        let cmd = Command::ltrim("k", 0, 99);
        assert_eq!(cmd.name(), "LTRIM");
        assert_eq!(
            cmd.args(),
            &[Arg::Str("k".into()), Arg::Int(0), Arg::Int(99)]
        );
    }

    #[test]
    fn test_display_hides_payload() {
        let cmd = Command::publish("chan", Bytes::from_static(b"{}"));
        assert_eq!(cmd.to_string(), "PUBLISH chan <2 bytes>");
    }
}
