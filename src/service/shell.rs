//! Prefix parser for the interactive shell.
//!
//! Every line is `<prefix>.<rest>`:
//!
//! | prefix | action |
//! |--------|--------|
//! | `h.` | show help |
//! | `v.` | print the client version |
//! | `l.` | print the IPC link path |
//! | `q.` | quit |
//! | `c.` | run a command: `NOP`, `STORE d k v`, `QUERY d k`, `CREATE d k v` |

use thiserror::Error;

use crate::core::packet::Datatype;
use crate::error::Result;
use crate::service::client::Client;

pub const PROMPT: &str = "odb~> ";

pub const HELP_TEXT: &str = "\
-- OSMORA database daemon --
[h.]   Show this help menu
[c.]   Perform a command (NOP, STORE <drum> <key> <value>,
       QUERY <drum> <key>, CREATE <drum> <key> <value>)
[l.]   Get link path
[v.]   Get version
[q.]   Quit client";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShellError {
    #[error("* Unknown command\n[?]: Use the 'h.' prefix for help")]
    Unknown,

    #[error("* Expected input")]
    ExpectedInput,

    #[error("* Usage: {0}")]
    Usage(&'static str),
}

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Link,
    Quit,
    Run(Request),
}

/// A `c.` command, ready to be sent to the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Nop,
    Store {
        drum: String,
        key: String,
        value: String,
    },
    Query {
        drum: String,
        key: String,
    },
    Create {
        drum: String,
        key: String,
        value: String,
    },
}

/// Parse a line; blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> std::result::Result<Option<Command>, ShellError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let mut chars = line.chars();
    let (Some(prefix), Some('.')) = (chars.next(), chars.next()) else {
        return Err(ShellError::Unknown);
    };
    let rest = chars.as_str().trim();

    let command = match prefix {
        'h' => Command::Help,
        'v' => Command::Version,
        'l' => Command::Link,
        'q' => Command::Quit,
        'c' if rest.is_empty() => return Err(ShellError::ExpectedInput),
        'c' => Command::Run(parse_request(rest)?),
        _ => return Err(ShellError::Unknown),
    };
    Ok(Some(command))
}

fn parse_request(input: &str) -> std::result::Result<Request, ShellError> {
    let (name, args) = match input.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim_start()),
        None => (input, ""),
    };

    match name.to_ascii_uppercase().as_str() {
        "NOP" => Ok(Request::Nop),
        "QUERY" => {
            let mut parts = args.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(drum), Some(key), None) => Ok(Request::Query {
                    drum: drum.to_string(),
                    key: key.to_string(),
                }),
                _ => Err(ShellError::Usage("QUERY <drum> <key>")),
            }
        }
        op @ ("STORE" | "CREATE") => {
            // the value is the remainder of the line and may contain spaces
            let mut parts = args.splitn(3, char::is_whitespace);
            let (Some(drum), Some(key), Some(value)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(ShellError::Usage(if op == "STORE" {
                    "STORE <drum> <key> <value>"
                } else {
                    "CREATE <drum> <key> <value>"
                }));
            };
            let (drum, key, value) = (drum.to_string(), key.to_string(), value.trim().to_string());
            if drum.is_empty() || key.is_empty() || value.is_empty() {
                return Err(ShellError::Usage("STORE|CREATE <drum> <key> <value>"));
            }
            Ok(if op == "STORE" {
                Request::Store { drum, key, value }
            } else {
                Request::Create { drum, key, value }
            })
        }
        _ => Err(ShellError::Unknown),
    }
}

/// Send `request` and render the daemon's answer for the terminal
pub async fn execute(client: &mut Client, request: &Request) -> Result<String> {
    match request {
        Request::Nop => {
            client.nop().await?;
            Ok("[*] nop ok".to_string())
        }
        Request::Store { drum, key, value } => {
            client
                .store(drum, key.as_bytes(), Datatype::Text, value.as_bytes())
                .await?;
            Ok(format!("[*] stored {drum}/{key}"))
        }
        Request::Create { drum, key, value } => {
            client
                .create(drum, key.as_bytes(), Datatype::Text, value.as_bytes())
                .await?;
            Ok(format!("[*] created {drum}/{key}"))
        }
        Request::Query { drum, key } => {
            let (datatype, payload) = client.query(drum, key.as_bytes()).await?;
            Ok(match datatype {
                Datatype::Text => String::from_utf8_lossy(&payload).into_owned(),
                _ => format!("<{} bytes> {:02x?}", payload.len(), &payload[..]),
            })
        }
    }
}
