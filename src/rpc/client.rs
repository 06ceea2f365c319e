//! Session to one simulator endpoint with request/response matching

use airsim_shared::codec::{self, CodecError, FrameDecoder, Message};
use anyhow::anyhow;
use bytes::Bytes;
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::transport::{TransportConnector, TransportStream};

/// Errors surfaced by an rpc call
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("connection to {0} endpoint closed")]
    Disconnected(String),

    #[error("{method} rejected by server: {message}")]
    Remote { method: String, message: String },

    #[error("{method} returned an unexpected result: {source}")]
    BadResult {
        method: String,
        #[source]
        source: rmpv::ext::Error,
    },

    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Configuration for an rpc session
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-call timeout; `None` waits as long as the server takes
    pub call_timeout: Option<Duration>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: None,
        }
    }
}

/// Raw outcome of a call as delivered by the read loop
struct Reply {
    error: Option<Value>,
    result: Value,
}

/// Calls waiting for a response; `None` once either loop has stopped
type PendingMap = Arc<Mutex<Option<HashMap<u32, oneshot::Sender<Reply>>>>>;

/// Mark the session closed, failing every in-flight call
async fn close_pending(pending: &PendingMap) {
    if let Some(calls) = pending.lock().await.take() {
        if !calls.is_empty() {
            debug!("Failing {} in-flight calls", calls.len());
        }
    }
}

/// A live session to one API server
pub struct RpcClient {
    name: String,
    next_msgid: AtomicU32,
    call_timeout: Option<Duration>,
    /// Channel feeding encoded frames to the write loop
    outbound_tx: mpsc::Sender<Bytes>,
    /// Calls waiting for a response, keyed by msgid
    pending: PendingMap,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RpcClient {
    /// Connect through `connector` within the configured timeout
    pub async fn connect<C: TransportConnector>(
        connector: &C,
        config: &RpcConfig,
    ) -> anyhow::Result<Self> {
        let name = connector.name().to_string();
        let stream = timeout(config.connect_timeout, connector.connect())
            .await
            .map_err(|_| {
                anyhow!(
                    "timed out connecting to {} endpoint after {:?}",
                    name,
                    config.connect_timeout
                )
            })??;

        debug!("Connected to {} endpoint", name);
        Ok(Self::from_stream(name, stream, config.call_timeout))
    }

    /// Run a session over an already-established stream
    pub fn from_stream<S: TransportStream>(
        name: impl Into<String>,
        stream: S,
        call_timeout: Option<Duration>,
    ) -> Self {
        let name = name.into();
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(32);
        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));

        let writer = tokio::spawn(write_loop(name.clone(), write_half, outbound_rx, pending.clone()));
        let reader = tokio::spawn(read_loop(
            name.clone(),
            read_half,
            pending.clone(),
            writer.abort_handle(),
        ));

        Self {
            name,
            next_msgid: AtomicU32::new(0),
            call_timeout,
            outbound_tx,
            pending,
            reader,
            writer,
        }
    }

    /// Endpoint name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke `method` and decode its result as `T`
    ///
    /// `params` must serialize as a sequence; use a tuple, or
    /// [`codec::NO_PARAMS`] for calls without arguments.
    pub async fn call<T, P>(&self, method: &str, params: P) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let msgid = self.next_msgid.fetch_add(1, Ordering::Relaxed);
        let frame = codec::encode_request(msgid, method, &params)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        match self.pending.lock().await.as_mut() {
            Some(calls) => {
                calls.insert(msgid, reply_tx);
            }
            None => return Err(RpcError::Disconnected(self.name.clone())),
        }

        trace!("{} -> {} (msgid={})", self.name, method, msgid);

        if self.outbound_tx.send(frame).await.is_err() {
            self.forget(msgid).await;
            return Err(RpcError::Disconnected(self.name.clone()));
        }

        let reply = match self.call_timeout {
            Some(limit) => match timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.forget(msgid).await;
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        timeout: limit,
                    });
                }
            },
            None => reply_rx.await,
        };

        // Sender dropped means the session closed
        let reply = reply.map_err(|_| RpcError::Disconnected(self.name.clone()))?;

        if let Some(error) = reply.error {
            return Err(RpcError::Remote {
                method: method.to_string(),
                message: describe_error(&error),
            });
        }

        rmpv::ext::from_value(reply.result).map_err(|source| RpcError::BadResult {
            method: method.to_string(),
            source,
        })
    }

    async fn forget(&self, msgid: u32) {
        if let Some(calls) = self.pending.lock().await.as_mut() {
            calls.remove(&msgid);
        }
    }

    /// Number of calls still waiting for a response
    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.as_ref().map_or(0, HashMap::len)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn describe_error(error: &Value) -> String {
    match error.as_str() {
        Some(message) => message.to_string(),
        None => error.to_string(),
    }
}

/// Decode responses and hand them to their waiting callers
async fn read_loop<R: AsyncRead + Unpin>(
    name: String,
    mut reader: R,
    pending: PendingMap,
    writer: AbortHandle,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 64 * 1024];

    'session: loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("{} endpoint closed the connection", name);
                break;
            }
            Ok(n) => {
                decoder.extend(&buf[..n]);

                // Process all complete frames
                loop {
                    match decoder.decode_next() {
                        Ok(Some(Message::Response { msgid, error, result })) => {
                            let waiting = pending.lock().await.as_mut().and_then(|calls| calls.remove(&msgid));
                            match waiting {
                                Some(reply_tx) => {
                                    // Caller may have timed out and gone away
                                    let _ = reply_tx.send(Reply { error, result });
                                }
                                None => warn!("{}: response for unknown msgid {}", name, msgid),
                            }
                        }
                        Ok(Some(other)) => {
                            debug!("{}: ignoring unsolicited message {:?}", name, other);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("{}: dropping session on bad frame: {}", name, e);
                            break 'session;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("{}: read error: {}", name, e);
                break;
            }
        }
    }

    close_pending(&pending).await;
    writer.abort();
}

/// Write encoded frames in submission order
async fn write_loop<W: AsyncWrite + Unpin>(
    name: String,
    mut writer: W,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    pending: PendingMap,
) {
    while let Some(frame) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!("{}: write error: {}", name, e);
            close_pending(&pending).await;
            return;
        }
    }

    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsim_shared::codec::NO_PARAMS;
    use bytes::BytesMut;
    use tokio::io::DuplexStream;

    /// Read one request from the server side of a duplex pipe
    async fn next_request(server: &mut DuplexStream, decoder: &mut FrameDecoder) -> Message {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(msg) = decoder.decode_next().expect("bad frame") {
                return msg;
            }
            let n = server.read(&mut buf).await.expect("read failed");
            assert!(n > 0, "client closed the pipe");
            decoder.extend(&buf[..n]);
        }
    }

    fn request_id(msg: &Message) -> u32 {
        match msg {
            Message::Request { msgid, .. } => *msgid,
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_decodes_result() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = RpcClient::from_stream("test", client_end, None);

        let server_task = tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let msg = next_request(&mut server, &mut decoder).await;
            match &msg {
                Message::Request { method, params, .. } => {
                    assert_eq!(method, "ping");
                    assert!(params.is_empty());
                }
                other => panic!("expected request, got {:?}", other),
            }
            let reply = codec::encode_response(request_id(&msg), None, &true).expect("encode");
            server.write_all(&reply).await.expect("write failed");
            server
        });

        let pong: bool = client.call("ping", NO_PARAMS).await.expect("call failed");
        assert!(pong);
        assert_eq!(client.pending_count().await, 0);
        let _server = server_task.await.expect("server task panicked");
    }

    #[tokio::test]
    async fn test_out_of_order_responses_are_matched() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = Arc::new(RpcClient::from_stream("test", client_end, None));

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.call::<i32, _>("getServerVersion", NO_PARAMS).await })
        };
        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.call::<String, _>("getName", NO_PARAMS).await })
        };

        let mut decoder = FrameDecoder::new();
        let a = next_request(&mut server, &mut decoder).await;
        let b = next_request(&mut server, &mut decoder).await;

        // Answer in reverse order, each with a result typed for its method
        let mut out = BytesMut::new();
        for msg in [&b, &a] {
            let reply = match msg {
                Message::Request { method, msgid, .. } if method == "getServerVersion" => {
                    codec::encode_response(*msgid, None, &1)
                }
                Message::Request { msgid, .. } => codec::encode_response(*msgid, None, &"sim"),
                other => panic!("expected request, got {:?}", other),
            };
            out.extend_from_slice(&reply.expect("encode"));
        }
        server.write_all(&out).await.expect("write failed");

        assert_eq!(first.await.expect("join").expect("call failed"), 1);
        assert_eq!(second.await.expect("join").expect("call failed"), "sim");
    }

    #[tokio::test]
    async fn test_remote_error() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = RpcClient::from_stream("test", client_end, None);

        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let msg = next_request(&mut server, &mut decoder).await;
            let reply = codec::encode_response(request_id(&msg), Some("no such vehicle"), &())
                .expect("encode");
            server.write_all(&reply).await.expect("write failed");
            // Hold the pipe open until the client is done
            let _ = server.read(&mut [0u8; 1]).await;
        });

        let result = client.call::<(), _>("armDisarm", (true, "Ghost")).await;
        match result {
            Err(RpcError::Remote { method, message }) => {
                assert_eq!(method, "armDisarm");
                assert_eq!(message, "no such vehicle");
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_call() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = RpcClient::from_stream("test", client_end, None);

        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let _ = next_request(&mut server, &mut decoder).await;
            drop(server);
        });

        let result = client.call::<bool, _>("takeoff", (20.0f32, "Drone1")).await;
        assert!(matches!(result, Err(RpcError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_call_after_server_closed_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let client = RpcClient::from_stream("test", stream, None);

        // Give the read loop time to see the close
        tokio::time::sleep(Duration::from_millis(100)).await;

        let result = tokio::time::timeout(Duration::from_secs(3), client.call::<bool, _>("ping", NO_PARAMS))
            .await
            .expect("call hung after the server closed");
        assert!(matches!(result, Err(RpcError::Disconnected(_))));

        // Later calls fail the same way
        let again = tokio::time::timeout(Duration::from_secs(3), client.call::<bool, _>("reset", NO_PARAMS))
            .await
            .expect("second call hung");
        assert!(matches!(again, Err(RpcError::Disconnected(_))));
    }

    /// Stream whose reads never finish and whose writes always fail
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_fails_calls() {
        let client = RpcClient::from_stream("test", BrokenPipe, None);

        let first = tokio::time::timeout(Duration::from_secs(3), client.call::<bool, _>("ping", NO_PARAMS))
            .await
            .expect("call hung after a write error");
        assert!(matches!(first, Err(RpcError::Disconnected(_))));

        let second = tokio::time::timeout(Duration::from_secs(3), client.call::<bool, _>("ping", NO_PARAMS))
            .await
            .expect("call hung after a write error");
        assert!(matches!(second, Err(RpcError::Disconnected(_))));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let (client_end, _server) = tokio::io::duplex(4096);
        let client = RpcClient::from_stream("test", client_end, Some(Duration::from_millis(20)));

        let result = client.call::<bool, _>("ping", NO_PARAMS).await;
        assert!(matches!(result, Err(RpcError::Timeout { .. })));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_unexpected_result_type() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = RpcClient::from_stream("test", client_end, None);

        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let msg = next_request(&mut server, &mut decoder).await;
            let reply = codec::encode_response(request_id(&msg), None, &"not a bool").expect("encode");
            server.write_all(&reply).await.expect("write failed");
            let _ = server.read(&mut [0u8; 1]).await;
        });

        let result = client.call::<bool, _>("ping", NO_PARAMS).await;
        assert!(matches!(result, Err(RpcError::BadResult { .. })));
    }
}
