//! Wire frames
//!
//! Every frame is a UTF-8 text WebSocket message whose fields are separated
//! by `:`. The last field of a frame (message content, error text) is taken
//! verbatim and may itself contain `:`.
//!
//! Client → server:
//! - `SUBSCRIBE:<channel>`
//! - `PUBLISH:<channel>:<content>`
//! - `UNSUBSCRIBE:<channel>`
//!
//! Server → client:
//! - `IDENTITY:<id>`
//! - `SUB-ACK:<channel>`
//! - `MSG:<channel>:<sender>:<content>`
//! - `UNSUB-ACK:<channel>`
//! - `ERROR:<code>:<message>`

use std::fmt;
use std::str::FromStr;

use crate::client::Identity;
use crate::utils::{BrokerError, FrameError};

const DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Subscribe { channel: String },
    Publish { channel: String, content: String },
    Unsubscribe { channel: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Identity(Identity),
    SubAck {
        channel: String,
    },
    Msg {
        channel: String,
        sender: Identity,
        content: String,
    },
    UnsubAck {
        channel: String,
    },
    Error {
        code: u16,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<&BrokerError> for ServerFrame {
    fn from(err: &BrokerError) -> Self {
        ServerFrame::error(err.code(), err.to_string())
    }
}

impl From<&FrameError> for ServerFrame {
    fn from(err: &FrameError) -> Self {
        ServerFrame::error(err.code(), err.to_string())
    }
}

impl fmt::Display for ClientFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFrame::Subscribe { channel } => write!(f, "SUBSCRIBE:{channel}"),
            ClientFrame::Publish { channel, content } => {
                write!(f, "PUBLISH:{channel}:{content}")
            }
            ClientFrame::Unsubscribe { channel } => write!(f, "UNSUBSCRIBE:{channel}"),
        }
    }
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerFrame::Identity(id) => write!(f, "IDENTITY:{id}"),
            ServerFrame::SubAck { channel } => write!(f, "SUB-ACK:{channel}"),
            ServerFrame::Msg {
                channel,
                sender,
                content,
            } => write!(f, "MSG:{channel}:{sender}:{content}"),
            ServerFrame::UnsubAck { channel } => write!(f, "UNSUB-ACK:{channel}"),
            ServerFrame::Error { code, message } => write!(f, "ERROR:{code}:{message}"),
        }
    }
}

/// Splits `text` into the command and the remainder after the first delimiter.
fn split_command(text: &str) -> Result<(&str, &str), FrameError> {
    text.split_once(DELIMITER)
        .ok_or_else(|| FrameError::UnknownCommand(truncate(text)))
}

fn truncate(text: &str) -> String {
    text.chars().take(32).collect()
}

impl FromStr for ClientFrame {
    type Err = FrameError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (command, rest) = split_command(text)?;
        match command {
            "SUBSCRIBE" => Ok(ClientFrame::Subscribe {
                channel: rest.to_string(),
            }),
            "UNSUBSCRIBE" => Ok(ClientFrame::Unsubscribe {
                channel: rest.to_string(),
            }),
            "PUBLISH" => {
                let (channel, content) = rest
                    .split_once(DELIMITER)
                    .ok_or(FrameError::Malformed("PUBLISH"))?;
                Ok(ClientFrame::Publish {
                    channel: channel.to_string(),
                    content: content.to_string(),
                })
            }
            other => Err(FrameError::UnknownCommand(truncate(other))),
        }
    }
}

impl FromStr for ServerFrame {
    type Err = FrameError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (command, rest) = split_command(text)?;
        match command {
            "IDENTITY" => Ok(ServerFrame::Identity(Identity::from(rest))),
            "SUB-ACK" => Ok(ServerFrame::SubAck {
                channel: rest.to_string(),
            }),
            "UNSUB-ACK" => Ok(ServerFrame::UnsubAck {
                channel: rest.to_string(),
            }),
            "MSG" => {
                let mut parts = rest.splitn(3, DELIMITER);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(channel), Some(sender), Some(content)) => Ok(ServerFrame::Msg {
                        channel: channel.to_string(),
                        sender: Identity::from(sender),
                        content: content.to_string(),
                    }),
                    _ => Err(FrameError::Malformed("MSG")),
                }
            }
            "ERROR" => {
                let (code, message) = rest
                    .split_once(DELIMITER)
                    .ok_or(FrameError::Malformed("ERROR"))?;
                let code = code
                    .parse::<u16>()
                    .map_err(|_| FrameError::Malformed("ERROR"))?;
                Ok(ServerFrame::error(code, message))
            }
            other => Err(FrameError::UnknownCommand(truncate(other))),
        }
    }
}
