use std::net::SocketAddr;

use anyhow::Error;
use quinn::{Connection, ConnectionError, Endpoint};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, trace, warn};

use arena_common::net::MessageStream;
use arena_common::protocol::{ClientMessage, ServerMessage};

// Handed out by the arena loop when it registers a link. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

// From the arena loop to a connection's writer.
#[derive(Debug)]
pub enum ServerToClient {
    Send(ServerMessage),
    Close,
}

// ============================================================================
// Links
// ============================================================================

/// Loop-side ends of one connection: an outbound queue and the messages read from the peer.
/// When `inbound` reports disconnected the reader has stopped for good.
#[derive(Debug)]
pub struct ClientLink {
    pub remote: SocketAddr,
    pub outbound: UnboundedSender<ServerToClient>,
    pub inbound: UnboundedReceiver<ClientMessage>,
}

/// Connection-side ends matching a [`ClientLink`].
#[derive(Debug)]
pub struct ConnectionEnds {
    pub outbound: UnboundedReceiver<ServerToClient>,
    pub inbound: UnboundedSender<ClientMessage>,
}

#[must_use]
pub fn link(remote: SocketAddr) -> (ClientLink, ConnectionEnds) {
    let (outbound_tx, outbound_rx) = unbounded_channel();
    let (inbound_tx, inbound_rx) = unbounded_channel();
    (
        ClientLink {
            remote,
            outbound: outbound_tx,
            inbound: inbound_rx,
        },
        ConnectionEnds {
            outbound: outbound_rx,
            inbound: inbound_tx,
        },
    )
}

// ============================================================================
// Listener
// ============================================================================

// Completes handshakes and hands each new link to the loop, which assigns the client id.
pub async fn accept_connections_task(endpoint: Endpoint, to_loop: UnboundedSender<ClientLink>) {
    while let Some(incoming) = endpoint.accept().await {
        let to_loop = to_loop.clone();
        tokio::spawn(async move {
            let connection = match incoming.await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("handshake failed: {e}");
                    return;
                }
            };
            let (client, ends) = link(connection.remote_address());
            if to_loop.send(client).is_err() {
                debug!("arena loop stopped, dropping {}", connection.remote_address());
                return;
            }
            serve_connection(connection, ends).await;
        });
    }
}

// ============================================================================
// Connection Service
// ============================================================================

// Reads on a task of its own; writes here until the loop closes the link or a send fails.
pub async fn serve_connection(connection: Connection, ends: ConnectionEnds) {
    let remote = connection.remote_address();
    let reader = tokio::spawn(read_messages(connection.clone(), ends.inbound));

    let mut outbound = ends.outbound;
    let stream = MessageStream::new(&connection);
    while let Some(command) = outbound.recv().await {
        match command {
            ServerToClient::Send(message) => {
                trace!("-> {remote}: {:?}", message);
                if let Err(e) = stream.send(&message).await {
                    describe_failure(remote, "send", &e);
                    break;
                }
            }
            ServerToClient::Close => break,
        }
    }

    connection.close(0u32.into(), b"arena closing");
    if let Err(e) = reader.await {
        warn!("reader for {remote} panicked: {e}");
    }
    debug!("{remote} finished");
}

// Dropping `inbound` on exit is how the loop learns the peer is gone.
async fn read_messages(connection: Connection, inbound: UnboundedSender<ClientMessage>) {
    let remote = connection.remote_address();
    let stream = MessageStream::new(&connection);
    loop {
        match stream.recv::<ClientMessage>().await {
            Ok(message) => {
                trace!("<- {remote}: {:?}", message);
                if inbound.send(message).is_err() {
                    return;
                }
            }
            Err(e) => {
                describe_failure(remote, "read", &e);
                return;
            }
        }
    }
}

fn describe_failure(remote: SocketAddr, during: &str, err: &Error) {
    match err.downcast_ref::<ConnectionError>() {
        Some(ConnectionError::ApplicationClosed(_) | ConnectionError::LocallyClosed) => {
            debug!("{remote} closed during {during}");
        }
        Some(ConnectionError::TimedOut) => debug!("{remote} timed out during {during}"),
        Some(other) => warn!("{remote} {during} failed: {other}"),
        None => warn!("{remote} {during} failed: {err:#}"),
    }
}
