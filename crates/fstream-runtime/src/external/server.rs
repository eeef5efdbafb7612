use std::sync::Arc;

use fstream_core::FsError;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::adapter::ExternalAdapter;
use super::protocol::{Request, Response};

/// Serves the worker protocol over TCP, one JSON message per line.
///
/// Unary requests (`write`, `commit`, state operations) are answered in
/// order on the same connection. A streaming request (`on_event`, `read`)
/// takes over its connection: the server pushes one response line per
/// message and the stream ends when the peer closes its side, the stream
/// source ends, or the server shuts down. A unary request in flight is
/// cancelled if its peer disconnects.
///
/// Lines longer than [`AdapterConfig::max_request_bytes`] are rejected and
/// the connection is closed.
///
/// [`AdapterConfig::max_request_bytes`]: super::AdapterConfig::max_request_bytes
pub struct WorkerServer {
    adapter: Arc<ExternalAdapter>,
}

impl WorkerServer {
    pub fn new(adapter: Arc<ExternalAdapter>) -> Self {
        Self { adapter }
    }

    /// Accept connections until `shutdown` is cancelled. Open connections
    /// observe the same token.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), FsError> {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, adapter = %self.adapter.config().name, "Worker server listening");

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept worker connection");
                        continue;
                    }
                },
            };

            let conn_id = format!("conn_{}", Uuid::new_v4().simple());
            tracing::debug!(conn_id, peer = %peer, "Worker connected");
            let adapter = Arc::clone(&self.adapter);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(&adapter, stream, &conn_id, &shutdown).await {
                    tracing::warn!(conn_id, error = %e, "Worker connection failed");
                }
                tracing::debug!(conn_id, "Worker disconnected");
            });
        }

        tracing::info!(addr = %addr, "Worker server stopped");
        Ok(())
    }
}

async fn handle_connection(
    adapter: &ExternalAdapter,
    stream: TcpStream,
    conn_id: &str,
    shutdown: &CancellationToken,
) -> Result<(), FsError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let max_line = adapter.config().max_request_bytes.max(1);
    let mut line = Vec::new();

    loop {
        line.clear();
        let mut limited = (&mut reader).take(max_line as u64);
        let read = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = limited.read_until(b'\n', &mut line) => read?,
        };
        if read == 0 {
            return Ok(());
        }
        if line.len() >= max_line && line.last() != Some(&b'\n') {
            tracing::warn!(conn_id, max_line, "Worker request exceeds line limit");
            let err = FsError::Protocol(format!("request line exceeds {max_line} bytes"));
            write_response(&mut writer, &Response::from(&err)).await?;
            return Ok(());
        }
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_slice(trimmed) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(conn_id, error = %e, "Malformed worker request");
                let err = FsError::Protocol(e.to_string());
                write_response(&mut writer, &Response::from(&err)).await?;
                continue;
            }
        };
        tracing::debug!(conn_id, method = request.method(), "Worker request");

        match request {
            Request::OnEvent {
                service_id,
                modules,
            } => {
                let ctx = shutdown.child_token();
                match adapter.on_event(ctx.clone(), &service_id, modules) {
                    Ok(events) => {
                        watch_peer(reader, ctx.clone());
                        return pump(events, writer, ctx, |event| Response::FunctionEvent {
                            event,
                        })
                        .await;
                    }
                    Err(err) => {
                        write_response(&mut writer, &Response::from(&err)).await?;
                        writer.shutdown().await?;
                        return Ok(());
                    }
                }
            }
            Request::Read { function_name } => {
                let ctx = shutdown.child_token();
                match adapter.read(ctx.clone(), &function_name).await {
                    Ok(events) => {
                        watch_peer(reader, ctx.clone());
                        return pump(events, writer, ctx, |event| Response::Event { event }).await;
                    }
                    Err(err) => {
                        ctx.cancel();
                        write_response(&mut writer, &Response::from(&err)).await?;
                    }
                }
            }
            request => {
                let ctx = shutdown.child_token();
                let call = unary(adapter, &ctx, request);
                tokio::pin!(call);

                // Watch for a disconnect only until the peer sends more data;
                // pipelined bytes stay buffered for the next iteration.
                let mut watching = true;
                let mut peer_gone = false;
                let response = loop {
                    tokio::select! {
                        response = &mut call => break response,
                        closed = peer_closed(&mut reader), if watching => {
                            watching = false;
                            if closed {
                                peer_gone = true;
                                ctx.cancel();
                            }
                        }
                    }
                };
                if peer_gone {
                    tracing::debug!(conn_id, "Worker left before its response");
                    return Ok(());
                }
                write_response(&mut writer, &response).await?;
            }
        }
    }
}

/// Resolves once the peer has sent more data (`false`) or closed its side
/// of the connection (`true`). Buffered data is left unconsumed.
async fn peer_closed(reader: &mut BufReader<OwnedReadHalf>) -> bool {
    match reader.fill_buf().await {
        Ok(buf) => buf.is_empty(),
        Err(_) => true,
    }
}

async fn unary(adapter: &ExternalAdapter, ctx: &CancellationToken, request: Request) -> Response {
    let result = match request {
        Request::Write {
            function_name,
            payload,
        } => adapter
            .write(ctx, &function_name, payload)
            .await
            .map(|()| Response::Ack),
        Request::Commit {
            function_name,
            event_id,
        } => adapter
            .commit(ctx, &function_name, &event_id)
            .await
            .map(|()| Response::Ack),
        Request::PutState {
            function_name,
            key,
            value,
        } => adapter
            .put_state(&function_name, &key, value)
            .await
            .map(|()| Response::Ack),
        Request::GetState { function_name, key } => adapter
            .get_state(&function_name, &key)
            .await
            .map(|value| Response::State { value }),
        Request::ListStates {
            function_name,
            start_inclusive,
            end_exclusive,
        } => adapter
            .list_states(&function_name, &start_inclusive, &end_exclusive)
            .await
            .map(|keys| Response::Keys { keys }),
        Request::DeleteState { function_name, key } => adapter
            .delete_state(&function_name, &key)
            .await
            .map(|()| Response::Ack),
        streaming @ (Request::OnEvent { .. } | Request::Read { .. }) => Err(FsError::Protocol(
            format!("{} is a streaming request", streaming.method()),
        )),
    };
    result.unwrap_or_else(|err| Response::from(&err))
}

/// Cancel `ctx` once the peer closes its side of the connection. Anything
/// the peer sends while a stream is open is discarded.
fn watch_peer(mut reader: BufReader<OwnedReadHalf>, ctx: CancellationToken) {
    tokio::spawn(async move {
        let mut discard = Vec::new();
        loop {
            discard.clear();
            tokio::select! {
                _ = ctx.cancelled() => break,
                read = reader.read_until(b'\n', &mut discard) => match read {
                    Ok(0) | Err(_) => {
                        ctx.cancel();
                        break;
                    }
                    Ok(_) => {}
                },
            }
        }
    });
}

async fn pump<T>(
    mut source: mpsc::Receiver<T>,
    mut writer: OwnedWriteHalf,
    ctx: CancellationToken,
    wrap: impl Fn(T) -> Response,
) -> Result<(), FsError> {
    let _guard = ctx.clone().drop_guard();
    loop {
        let item = tokio::select! {
            _ = ctx.cancelled() => break,
            item = source.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        write_response(&mut writer, &wrap(item)).await?;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<(), FsError> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}
