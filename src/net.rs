use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::alphabet::Letter;
use crate::error::LearnError;
use crate::teacher::Teacher;
use crate::word::Word;

/// A [`Teacher`] that talks to a remote target over TCP.
///
/// Each submitted word opens one connection; every letter is written as its
/// rendering followed by a newline and the matching response line becomes a
/// [`Letter::Str`] of the output word. Framing beyond newline separation is
/// the target's concern. All I/O errors, including timeouts, surface as
/// [`LearnError::Transport`] and end the session.
#[derive(Debug, Clone)]
pub struct TcpTeacher {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpTeacher {
    /// Creates an adapter with a 5 second connect/read/write timeout.
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeout(addr, Duration::from_secs(5))
    }

    pub fn with_timeout(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

impl Teacher for TcpTeacher {
    fn submit(&mut self, word: &Word) -> Result<Word, LearnError> {
        debug!("submitting {word} to {}", self.addr);

        let stream = TcpStream::connect_timeout(&self.addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        let mut outputs = Word::epsilon();
        for letter in word.letters() {
            writeln!(writer, "{letter}")?;
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "target closed the connection mid-word",
                )
                .into());
            }
            outputs.push(Letter::str(line.trim_end_matches(['\r', '\n'])));
        }
        Ok(outputs)
    }
}
