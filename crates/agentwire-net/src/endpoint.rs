//! The blocking TCP endpoint.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddrV4, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::thread;
use std::time::Duration;

use agentwire_buffer::{BufferView, BufferWritableView, Ipv4Address};
use agentwire_codec::header::{LENGTH_OFFSET, VERSION_OFFSET};
use agentwire_codec::{PREAMBLE_LEN, PROTOCOL_VERSION};
use tracing::{debug, info, warn};

use crate::error::{NetError, Result};

/// Default TCP port for controller/agent traffic.
pub const DEFAULT_PORT: u16 = 2210;

/// Default poll timeout.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

/// Backoff applied between retries of transient read/write errors.
const RETRY_SLEEP: Duration = Duration::from_millis(100);

const READ_CHUNK_LEN: usize = 8 * 1024;

/// A blocking TCP endpoint framing whole messages.
///
/// Either side of the protocol: a listener accepting one connection
/// at a time, or a client dialing out. Holds at most one listening
/// socket and one connected stream; both close on drop.
pub struct Endpoint {
    address: Ipv4Address,
    port: u16,
    delay: Duration,
    listener: Option<TcpListener>,
    conn: Option<TcpStream>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            address: Ipv4Address::ANY,
            port: DEFAULT_PORT,
            delay: DEFAULT_DELAY,
            listener: None,
            conn: None,
        }
    }
}

impl Endpoint {
    pub fn new() -> Endpoint {
        Endpoint::default()
    }

    /// Address to listen on, or to connect to. The any-address means
    /// every interface when listening and the loopback when
    /// connecting.
    pub fn with_address(mut self, address: Ipv4Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Poll timeout used by [`Endpoint::poll`] and [`Endpoint::sleep`].
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn address(&self) -> Ipv4Address {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The port the listener actually bound (useful with port 0).
    pub fn local_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map(|a| a.port())
    }

    /// (Re)open the listening socket; closes any existing sockets
    /// first.
    pub fn open_listening(&mut self) -> Result<()> {
        self.close();
        let addr = SocketAddrV4::new(self.address.into(), self.port);
        let listener = TcpListener::bind(addr).map_err(|source| NetError::Bind { addr, source })?;
        info!(%addr, "listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Blocking accept, if listening and not yet connected.
    pub fn accept_if_needed(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if let Some(listener) = &self.listener {
            let (stream, peer) = listener.accept().map_err(NetError::Accept)?;
            debug!(%peer, "accepted connection");
            self.conn = Some(stream);
        }
        Ok(())
    }

    /// Attempt a blocking connect; closes any existing sockets first.
    ///
    /// Returns `Ok(false)` when the attempt failed in a recoverable
    /// way (refused, timed out, interrupted); the caller may retry
    /// later.
    pub fn open_client(&mut self) -> Result<bool> {
        self.close();
        let target = if self.address == Ipv4Address::ANY {
            Ipv4Address::LOCALHOST
        } else {
            self.address
        };
        let addr = SocketAddrV4::new(target.into(), self.port);
        match TcpStream::connect(addr) {
            Ok(stream) => {
                debug!(%addr, "connected");
                self.conn = Some(stream);
                Ok(true)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionRefused | ErrorKind::Interrupted | ErrorKind::TimedOut
                ) =>
            {
                debug!(%addr, error = %err, "connect attempt failed, will retry");
                Ok(false)
            }
            Err(source) => Err(NetError::Connect { addr, source }),
        }
    }

    /// Close both descriptors. Idempotent.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!("closed connection");
        }
        if self.listener.take().is_some() {
            debug!("closed listener");
        }
    }

    /// True when there is no connected stream.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Wait up to the configured delay for readability.
    ///
    /// If the listener becomes ready while no connection exists, the
    /// connection is accepted and the wait resumes once. Returns true
    /// iff data is available on the connected socket.
    pub fn poll(&mut self) -> Result<bool> {
        self.poll_inner(true)
    }

    fn poll_inner(&mut self, may_accept: bool) -> Result<bool> {
        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(2);
        let mut listener_idx = None;
        let mut conn_idx = None;

        if let Some(listener) = &self.listener {
            listener_idx = Some(fds.len());
            fds.push(libc::pollfd {
                fd: listener.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }
        if let Some(conn) = &self.conn {
            conn_idx = Some(fds.len());
            fds.push(libc::pollfd {
                fd: conn.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }
        if fds.is_empty() {
            return Ok(false);
        }

        let timeout = i32::try_from(self.delay.as_millis()).unwrap_or(i32::MAX);
        // SAFETY: `fds` is a valid, initialized pollfd array for the
        // length passed, and the descriptors are owned by this
        // endpoint for the duration of the call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };

        if rc == 0 {
            return Ok(false);
        }
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(NetError::Io(err));
        }

        let ready = |idx: Option<usize>| {
            idx.map(|i| fds[i].revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0)
                .unwrap_or(false)
        };

        if ready(listener_idx) && self.conn.is_none() && may_accept {
            self.accept_if_needed()?;
            if self.conn.is_some() {
                return self.poll_inner(false);
            }
        }

        Ok(ready(conn_idx))
    }

    /// Sleep for the configured delay.
    pub fn sleep(&self) {
        thread::sleep(self.delay);
    }

    /// Read exactly one whole message into `buffer`.
    ///
    /// Drains the 8-byte preamble, extracts the declared frame
    /// length, then drains the remainder. Transient errors retry
    /// with a fixed backoff; a peer disconnect closes the connection
    /// and yields an empty view. A frame with an unknown protocol
    /// version is consumed but yields an empty view, leaving the
    /// stream aligned on the next frame.
    pub fn read_message(&mut self, buffer: &BufferWritableView) -> Result<BufferView> {
        if self.conn.is_none() {
            return Err(NetError::NotConnected);
        }
        if buffer.len() < PREAMBLE_LEN {
            return Err(NetError::BufferTooSmall {
                required: PREAMBLE_LEN,
                available: buffer.len(),
            });
        }

        if !self.drain_into(buffer, 0, PREAMBLE_LEN)? {
            return Ok(BufferView::empty());
        }

        let version = buffer.get_u8(VERSION_OFFSET)?;
        let length = buffer.get_u32(LENGTH_OFFSET)? as usize;

        if length < PREAMBLE_LEN {
            self.close();
            return Err(NetError::InvalidFrameLength { length });
        }
        if buffer.len() < length {
            // Either junk on the wire or an undersized read buffer;
            // in both cases the stream can no longer be trusted.
            self.close();
            return Err(NetError::BufferTooSmall {
                required: length,
                available: buffer.len(),
            });
        }

        if !self.drain_into(buffer, PREAMBLE_LEN, length)? {
            return Ok(BufferView::empty());
        }

        if version != PROTOCOL_VERSION {
            // The whole frame is consumed, so skipping it keeps the
            // stream aligned.
            warn!(version, length, "skipping frame with unknown version");
            return Ok(BufferView::empty());
        }

        Ok(buffer.sub(0, length)?.into())
    }

    /// Write one encoded message, as sized by its own length field.
    ///
    /// Returns the number of bytes written; 0 means the peer closed
    /// the connection mid-write.
    pub fn write_message(&mut self, message: &BufferView) -> Result<usize> {
        if self.conn.is_none() {
            return Err(NetError::NotConnected);
        }

        let length = message.get_u32(LENGTH_OFFSET)? as usize;
        let bytes = message.sub(0, length)?.to_vec();

        let mut written = 0;
        while written < bytes.len() {
            let stream = match self.conn.as_mut() {
                Some(stream) => stream,
                None => return Ok(0),
            };
            match stream.write(&bytes[written..]) {
                Ok(0) => {
                    self.close();
                    return Ok(0);
                }
                Ok(n) => written += n,
                Err(err)
                    if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    thread::sleep(RETRY_SLEEP);
                }
                Err(err) => {
                    self.close();
                    return Err(NetError::Io(err));
                }
            }
        }
        Ok(written)
    }

    /// Drain `end - offset` bytes from the connection into the view.
    ///
    /// Returns false when the peer closed the connection; the
    /// endpoint is closed in that case.
    fn drain_into(
        &mut self,
        buffer: &BufferWritableView,
        mut offset: usize,
        end: usize,
    ) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_LEN];
        while offset < end {
            let want = (end - offset).min(chunk.len());
            let stream = match self.conn.as_mut() {
                Some(stream) => stream,
                None => return Ok(false),
            };
            match stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    self.close();
                    return Ok(false);
                }
                Ok(n) => {
                    buffer.copy_from_slice(offset, &chunk[..n])?;
                    offset += n;
                }
                Err(err)
                    if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    thread::sleep(RETRY_SLEEP);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
                    ) =>
                {
                    self.close();
                    return Ok(false);
                }
                Err(err) => {
                    self.close();
                    return Err(NetError::Io(err));
                }
            }
        }
        Ok(true)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("delay", &self.delay)
            .field("listening", &self.listener.is_some())
            .field("connected", &self.conn.is_some())
            .finish()
    }
}
