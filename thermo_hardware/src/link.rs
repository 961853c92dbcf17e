//! Line-oriented command/query transport.
//!
//! Both instruments speak a newline-terminated ASCII protocol. `Link` is the
//! byte-level seam; `Session` layers the query delay on top of it.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{HwError, Result};

pub trait Link {
    fn write_line(&mut self, line: &str) -> Result<()>;
    /// Read one reply line with the terminator stripped.
    fn read_line(&mut self) -> Result<String>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }
    fn read_line(&mut self) -> Result<String> {
        (**self).read_line()
    }
}

fn map_io(e: std::io::Error) -> HwError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => HwError::Timeout,
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            HwError::Disconnected
        }
        _ => HwError::Io(e),
    }
}

/// TCP link, e.g. to a GPIB/Ethernet bridge. The socket is closed on drop.
pub struct TcpLink {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpLink {
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let sock = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| HwError::Io(std::io::Error::other(format!("unresolved {addr}"))))?;
        let stream = TcpStream::connect_timeout(&sock, timeout).map_err(map_io)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        tracing::info!(%addr, "instrument link open");
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }
}

impl Link for TcpLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(map_io)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).map_err(map_io)?;
        if n == 0 {
            return Err(HwError::Disconnected);
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Command/query session over a link.
///
/// Every query waits `query_delay` between sending the command and reading
/// the reply; the controller needs ~200 ms to settle after a write.
pub struct Session<L: Link> {
    link: L,
    query_delay: Duration,
}

impl<L: Link> Session<L> {
    pub fn new(link: L, query_delay: Duration) -> Self {
        Self { link, query_delay }
    }

    pub fn write(&mut self, command: &str) -> Result<()> {
        tracing::trace!(command, "instrument write");
        self.link.write_line(command)
    }

    pub fn query(&mut self, command: &str) -> Result<String> {
        self.link.write_line(command)?;
        if !self.query_delay.is_zero() {
            std::thread::sleep(self.query_delay);
        }
        let reply = self.link.read_line()?;
        tracing::trace!(command, reply = %reply, "instrument query");
        Ok(reply)
    }

    /// Query and parse a numeric reply.
    pub fn query_f64(&mut self, command: &str) -> Result<f64> {
        let reply = self.query(command)?;
        parse_f64(command, &reply)
    }
}

pub(crate) fn parse_f64(command: &str, reply: &str) -> Result<f64> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|_| HwError::Malformed {
            command: command.to_string(),
            reply: reply.to_string(),
        })
}
