use std::fmt;

use crate::ProtocolError;

/// A parsed client request.
///
/// One command per protocol exchange. Arguments are whitespace-separated,
/// so filenames cannot contain spaces (a property inherited from the wire
/// format, enforced again by the server's name validation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enumerate current files in the server's file area.
    List,
    /// Push `size` bytes to the server under `name`.
    Upload { name: String, size: u64 },
    /// Pull the named file from the server.
    Download { name: String },
    /// Record a resume offset for a download in flight.
    Checkpoint { name: String, offset: u64 },
}

impl Command {
    /// Parses one command line.
    ///
    /// Extra trailing arguments are rejected the same way as missing ones:
    /// the line does not match the command's expected shape.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut parts = line.split_whitespace();
        let kind = parts.next().ok_or(ProtocolError::EmptyCommand)?;

        let command = match kind {
            "LIST" => Command::List,
            "UPLOAD" => {
                let name = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("UPLOAD <name>"))?;
                let size = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("UPLOAD <size>"))?;
                let size = size.parse().map_err(|_| ProtocolError::InvalidArgument {
                    command: "UPLOAD",
                    value: size.to_string(),
                })?;
                Command::Upload {
                    name: name.to_string(),
                    size,
                }
            }
            "DOWNLOAD" => {
                let name = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("DOWNLOAD <name>"))?;
                Command::Download {
                    name: name.to_string(),
                }
            }
            "CHECKPOINT" => {
                let name = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("CHECKPOINT <name>"))?;
                let offset = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("CHECKPOINT <offset>"))?;
                let offset = offset.parse().map_err(|_| ProtocolError::InvalidArgument {
                    command: "CHECKPOINT",
                    value: offset.to_string(),
                })?;
                Command::Checkpoint {
                    name: name.to_string(),
                    offset,
                }
            }
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        if parts.next().is_some() {
            return Err(ProtocolError::InvalidArgument {
                command: "trailing",
                value: line.to_string(),
            });
        }

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::List => write!(f, "LIST"),
            Command::Upload { name, size } => write!(f, "UPLOAD {name} {size}"),
            Command::Download { name } => write!(f, "DOWNLOAD {name}"),
            Command::Checkpoint { name, offset } => write!(f, "CHECKPOINT {name} {offset}"),
        }
    }
}

/// The peer's answer to a DOWNLOAD size announcement: start fresh or
/// continue from a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Ready,
    Resume(u64),
}

impl Continuation {
    /// Offset the transfer starts from.
    pub fn offset(&self) -> u64 {
        match self {
            Continuation::Ready => 0,
            Continuation::Resume(offset) => *offset,
        }
    }

    /// Parses a continuation line (`READY` or `RESUME <offset>`).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("READY") => Ok(Continuation::Ready),
            Some("RESUME") => {
                let offset = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("RESUME <offset>"))?;
                let offset = offset.parse().map_err(|_| ProtocolError::InvalidArgument {
                    command: "RESUME",
                    value: offset.to_string(),
                })?;
                Ok(Continuation::Resume(offset))
            }
            _ => Err(ProtocolError::UnexpectedContinuation(line.to_string())),
        }
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Ready => write!(f, "READY"),
            Continuation::Resume(offset) => write!(f, "RESUME {offset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        assert_eq!(Command::parse("LIST").unwrap(), Command::List);
    }

    #[test]
    fn parse_upload() {
        let cmd = Command::parse("UPLOAD report.txt 500").unwrap();
        assert_eq!(
            cmd,
            Command::Upload {
                name: "report.txt".into(),
                size: 500,
            }
        );
    }

    #[test]
    fn parse_download() {
        let cmd = Command::parse("DOWNLOAD ghost.bin").unwrap();
        assert_eq!(
            cmd,
            Command::Download {
                name: "ghost.bin".into(),
            }
        );
    }

    #[test]
    fn parse_checkpoint() {
        let cmd = Command::parse("CHECKPOINT big.iso 4194304").unwrap();
        assert_eq!(
            cmd,
            Command::Checkpoint {
                name: "big.iso".into(),
                offset: 4_194_304,
            }
        );
    }

    #[test]
    fn parse_empty_line() {
        assert!(matches!(
            Command::parse(""),
            Err(ProtocolError::EmptyCommand)
        ));
        assert!(matches!(
            Command::parse("   "),
            Err(ProtocolError::EmptyCommand)
        ));
    }

    #[test]
    fn parse_unknown_command() {
        assert!(matches!(
            Command::parse("FROBNICATE x"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn parse_upload_missing_size() {
        assert!(matches!(
            Command::parse("UPLOAD report.txt"),
            Err(ProtocolError::MissingArgument(_))
        ));
    }

    #[test]
    fn parse_upload_bad_size() {
        assert!(matches!(
            Command::parse("UPLOAD report.txt five"),
            Err(ProtocolError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn parse_rejects_trailing_arguments() {
        assert!(Command::parse("LIST please").is_err());
        assert!(Command::parse("DOWNLOAD a.txt b.txt").is_err());
    }

    #[test]
    fn display_roundtrip() {
        for line in [
            "LIST",
            "UPLOAD report.txt 500",
            "DOWNLOAD report.txt",
            "CHECKPOINT big.iso 4194304",
        ] {
            let cmd = Command::parse(line).unwrap();
            assert_eq!(cmd.to_string(), line);
        }
    }

    #[test]
    fn continuation_parse() {
        assert_eq!(Continuation::parse("READY").unwrap(), Continuation::Ready);
        assert_eq!(
            Continuation::parse("RESUME 4194304").unwrap(),
            Continuation::Resume(4_194_304)
        );
        assert_eq!(Continuation::parse("RESUME 0").unwrap().offset(), 0);
    }

    #[test]
    fn continuation_rejects_garbage() {
        assert!(Continuation::parse("GO").is_err());
        assert!(Continuation::parse("RESUME").is_err());
        assert!(Continuation::parse("RESUME later").is_err());
    }

    #[test]
    fn continuation_display() {
        assert_eq!(Continuation::Ready.to_string(), "READY");
        assert_eq!(Continuation::Resume(42).to_string(), "RESUME 42");
    }
}
