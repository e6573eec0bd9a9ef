// ABOUTME: Byte-stream backends a Bus can be framed over: serial port, TCP (telnet scheme), or a local file
// ABOUTME: BusStream erases the concrete transport behind one AsyncRead+AsyncWrite type so Bus stays transport-agnostic

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{self, AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;

use crate::error::{FinitudeError, Result};

/// Default baud rate observed on Carrier/Bryant RS-485 buses.
pub const SERIAL_BAUD_RATE: u32 = 38400;
const DEFAULT_TELNET_PORT: u16 = 23;

/// A byte stream a [`crate::bus::Bus`] can be framed over. Wraps whichever
/// concrete transport [`open`] selected so the rest of the stack only needs
/// one `AsyncRead + AsyncWrite` type.
pub enum BusStream {
    Serial(tokio_serial::SerialStream),
    Tcp(TcpStream),
    File(File),
}

impl AsyncRead for BusStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_read(cx, buf),
            BusStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            BusStream::File(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BusStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_write(cx, buf),
            BusStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            BusStream::File(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_flush(cx),
            BusStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            BusStream::File(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_shutdown(cx),
            BusStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            BusStream::File(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Open a stream from a bare path (serial device) or a `scheme://` URI:
///
/// - no scheme, or `file://path` -- a serial port at 38400 baud
/// - `localfile://path` -- replay from a plain local file, read-only
/// - `telnet://host[:port]` -- a TCP connection (port defaults to 23)
/// - `filerange://...` -- not implemented; always returns [`FinitudeError::UnknownScheme`]
///
/// Any other scheme is rejected with [`FinitudeError::UnknownScheme`].
pub async fn open(where_: &str) -> Result<BusStream> {
    match where_.split_once("://") {
        None => open_serial(where_).await,
        Some(("file", rest)) => open_serial(rest).await,
        Some(("localfile", rest)) => {
            let file = File::options().read(true).open(Path::new(rest)).await?;
            Ok(BusStream::File(file))
        }
        Some(("telnet", rest)) => {
            let (host, port) = match rest.split_once(':') {
                Some((host, port)) => {
                    let port: u16 = port
                        .parse()
                        .map_err(|_| FinitudeError::InvalidAddress(format!("telnet port {port:?}")))?;
                    (host, port)
                }
                None => (rest, DEFAULT_TELNET_PORT),
            };
            let stream = TcpStream::connect((host, port)).await?;
            Ok(BusStream::Tcp(stream))
        }
        Some((scheme, _)) => Err(FinitudeError::UnknownScheme(scheme.to_string())),
    }
}

async fn open_serial(path: &str) -> Result<BusStream> {
    let path = path.to_string();
    let opened = tokio::task::spawn_blocking(move || {
        tokio_serial::new(path, SERIAL_BAUD_RATE).open_native_async()
    })
    .await
    .map_err(|e| FinitudeError::Io(io::Error::other(e)))?;
    let stream = opened.map_err(|e| FinitudeError::Io(e.into()))?;
    Ok(BusStream::Serial(stream))
}
