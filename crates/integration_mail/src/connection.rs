//! Line-oriented async connection used by the POP3 and SMTP clients

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tokio_native_tls::TlsConnector;
use tracing::{debug, trace};

use crate::{MailError, MailServerConfig, build_native_tls_connector};

/// Either side of a plaintext or TLS socket
pub(crate) trait MailStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> MailStream for T {}

pub(crate) type BoxedStream = Box<dyn MailStream>;

/// Buffered connection with a per-reply timeout
pub(crate) struct LineConnection<S> {
    stream: BufReader<S>,
    command_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> LineConnection<S> {
    pub(crate) fn new(stream: S, command_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            command_timeout,
        }
    }

    pub(crate) fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Write `line` followed by CRLF
    ///
    /// Only the verb is traced so credentials never reach the logs.
    pub(crate) async fn send_line(&mut self, line: &str) -> Result<(), MailError> {
        trace!(command = %line.split(' ').next().unwrap_or(line), "Sending command");
        self.write_all(format!("{line}\r\n").as_bytes()).await
    }

    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> Result<(), MailError> {
        let limit = self.command_timeout;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        timeout(limit, write)
            .await
            .map_err(|_| MailError::Timeout("writing to server".to_string()))?
            .map_err(|e| MailError::ConnectionFailed(format!("Write failed: {e}")))
    }

    /// Read one line including its terminator; errors on EOF
    pub(crate) async fn read_line_bytes(&mut self) -> Result<Vec<u8>, MailError> {
        let mut line = Vec::new();
        let read = timeout(self.command_timeout, self.stream.read_until(b'\n', &mut line))
            .await
            .map_err(|_| MailError::Timeout("waiting for server reply".to_string()))?
            .map_err(|e| MailError::ConnectionFailed(format!("Read failed: {e}")))?;
        if read == 0 {
            return Err(MailError::ConnectionFailed(
                "Server closed the connection".to_string(),
            ));
        }
        Ok(line)
    }

    /// Read one line as text with the line terminator removed
    pub(crate) async fn read_line(&mut self) -> Result<String, MailError> {
        let bytes = self.read_line_bytes().await?;
        let line = String::from_utf8_lossy(&bytes).trim_end_matches(['\r', '\n']).to_string();
        trace!(line = %line, "Server reply");
        Ok(line)
    }
}

/// Open a TCP connection, wrapping it in TLS when `config.secure` is set
pub(crate) async fn open(config: &MailServerConfig) -> Result<BoxedStream, MailError> {
    let tcp = connect_tcp(config).await?;
    if config.secure {
        Ok(Box::new(upgrade_tls(config, tcp).await?))
    } else {
        Ok(Box::new(tcp))
    }
}

pub(crate) async fn connect_tcp(config: &MailServerConfig) -> Result<TcpStream, MailError> {
    let addr = config.address();
    debug!(addr = %addr, "Connecting to mail server");
    timeout(config.timeouts.connect, TcpStream::connect(&addr))
        .await
        .map_err(|_| MailError::Timeout(format!("connecting to {addr}")))?
        .map_err(|e| MailError::ConnectionFailed(format!("TCP connection to {addr} failed: {e}")))
}

pub(crate) async fn upgrade_tls<S>(
    config: &MailServerConfig,
    stream: S,
) -> Result<tokio_native_tls::TlsStream<S>, MailError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connector = TlsConnector::from(build_native_tls_connector(&config.tls)?);
    timeout(config.timeouts.connect, connector.connect(&config.host, stream))
        .await
        .map_err(|_| MailError::Timeout("TLS handshake".to_string()))?
        .map_err(|e| MailError::Tls(format!("TLS handshake failed: {e}")))
}

/// Undo dot-stuffing of one line of a multi-line response
///
/// Returns `None` for the terminating `.` line.
pub(crate) fn unstuff_line(line: &[u8]) -> Option<&[u8]> {
    let content = line
        .strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line);
    if content == b"." {
        return None;
    }
    Some(line.strip_prefix(b".").unwrap_or(line))
}

/// Apply dot-stuffing and normalize line endings for an SMTP DATA payload
pub(crate) fn stuff_data(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len() + 16);
    for line in normalized.split('\n') {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}
