//! Connection to the feed server.
//!
//! Commands go out as one JSON line each; frames are read back line by line.
use feed_common::{Command, FeedError, Frame, Result};
use log::{debug, info};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

/// One TCP connection to the feed server.
pub struct FeedConnection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl FeedConnection {
    /// Connect to `server` (`host:port`).
    pub fn connect(server: &str) -> Result<Self> {
        info!("Connecting to feed server at {}", server);
        let stream = TcpStream::connect(server)
            .map_err(|e| FeedError::Format(format!("Failed to connect to {}: {}", server, e)))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    /// Independent handle on the socket, e.g. for a Ctrl+C handler.
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    /// Write one command.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        send_command(&mut self.stream, command)
    }

    /// Next frame, or `None` once the server closed the connection.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                return Ok(Some(serde_json::from_str(line.trim())?));
            }
        }
    }
}

/// Write `command` as one JSON line to `out`.
pub fn send_command<W: Write>(out: &mut W, command: &Command) -> Result<()> {
    debug!("Sending command: {:?}", command);
    out.write_all(&command.to_line()?)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_newline_terminated_json() {
        let mut out = Vec::new();
        send_command(&mut out, &Command::Unsubscribe).unwrap();
        send_command(&mut out, &Command::Get { symbol: "AAPL".into() }).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"command\":\"unsubscribe\"}\n{\"command\":\"get\",\"symbol\":\"AAPL\"}\n"
        );
    }
}
