//! TCP transport: live packet stream to a console/collector.
//!
//! The handshake is line-based: the server sends its banner line
//! first, the client answers with its own, then framed packets flow
//! client-to-server. Every packet is flushed immediately so a viewer
//! sees entries as they happen.

use crate::error::{CoreError, CoreResult};
use crate::options::SinkOptions;
use crate::sink::Transport;
use silpipe_codec::Packet;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const MAX_BANNER: usize = 1024;

/// A transport streaming packets over TCP.
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Builds a TCP transport from resolved options.
    ///
    /// Recognized keys: `host` (default 127.0.0.1), `port` (default
    /// 4228), `timeout` (default 30 s, applied to connect, read and
    /// write).
    pub fn from_options(options: &SinkOptions) -> Self {
        let port = options.get_int("port", 4228);
        let port = u16::try_from(port).unwrap_or(4228);
        Self {
            host: options.get_str("host", "127.0.0.1"),
            port,
            timeout: Duration::from_millis(options.get_timespan("timeout", 30_000).max(1)),
            stream: None,
        }
    }

    fn client_banner() -> String {
        format!("silpipe rust library v{}\n", env!("CARGO_PKG_VERSION"))
    }

    /// Reads the newline-terminated server banner.
    fn read_banner(stream: &mut TcpStream) -> CoreResult<String> {
        let mut banner = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte)?;
            if n == 0 {
                return Err(CoreError::connect("server closed during banner"));
            }
            if byte[0] == b'\n' {
                break;
            }
            banner.push(byte[0]);
            if banner.len() > MAX_BANNER {
                return Err(CoreError::connect("server banner too long"));
            }
        }
        Ok(String::from_utf8_lossy(&banner).into_owned())
    }

    fn connected(&mut self) -> CoreResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(CoreError::Disconnected)
    }
}

impl Transport for TcpTransport {
    fn protocol(&self) -> &'static str {
        "tcp"
    }

    fn open(&mut self) -> CoreResult<()> {
        let address = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| CoreError::connect(format!("cannot resolve {}: {e}", self.host)))?
            .next()
            .ok_or_else(|| CoreError::connect(format!("no address for {}", self.host)))?;

        let mut stream = TcpStream::connect_timeout(&address, self.timeout)
            .map_err(|e| CoreError::connect(format!("{address}: {e}")))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;

        let banner = Self::read_banner(&mut stream)?;
        stream.write_all(Self::client_banner().as_bytes())?;
        stream.flush()?;
        tracing::debug!(server = %banner, "tcp handshake complete");

        self.stream = Some(stream);
        Ok(())
    }

    fn write_packet(&mut self, packet: &Packet) -> CoreResult<()> {
        let encoded = packet.encode();
        let stream = self.connected()?;
        stream
            .write_all(&encoded)
            .and_then(|()| stream.flush())
            .map_err(|e| CoreError::write(format!("tcp stream: {e}")))
    }

    fn close(&mut self) -> CoreResult<()> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silpipe_codec::{Level, Watch, WatchType};
    use std::net::TcpListener;
    use std::thread;

    fn transport_for(port: u16) -> TcpTransport {
        TcpTransport::from_options(
            &SinkOptions::new()
                .with("host", "127.0.0.1")
                .with("port", port.to_string())
                .with("timeout", "2s"),
        )
    }

    /// Accepts one client: sends the banner, reads the client banner,
    /// then returns all remaining bytes.
    fn one_shot_server(listener: TcpListener) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"silpipe test server\n").unwrap();

            let mut byte = [0u8; 1];
            loop {
                socket.read_exact(&mut byte).unwrap();
                if byte[0] == b'\n' {
                    break;
                }
            }

            let mut rest = Vec::new();
            socket.read_to_end(&mut rest).unwrap();
            rest
        })
    }

    #[test]
    fn handshake_and_packet_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = one_shot_server(listener);

        let packet = Packet::watch(
            Level::Message,
            7,
            Watch {
                name: "cpu".to_owned(),
                value: "93".to_owned(),
                watch_type: WatchType::Integer,
            },
        );

        let mut transport = transport_for(port);
        transport.open().unwrap();
        transport.write_packet(&packet).unwrap();
        transport.close().unwrap();

        let received = server.join().unwrap();
        let packets = Packet::decode_all(&received).unwrap();
        assert_eq!(packets, vec![packet]);
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = transport_for(port);
        assert!(matches!(transport.open(), Err(CoreError::Connect { .. })));
    }

    #[test]
    fn write_before_open_is_disconnected() {
        let mut transport = transport_for(4228);
        let packet = Packet::watch(
            Level::Message,
            0,
            Watch {
                name: "w".to_owned(),
                value: String::new(),
                watch_type: WatchType::String,
            },
        );
        assert!(matches!(
            transport.write_packet(&packet),
            Err(CoreError::Disconnected)
        ));
    }
}
