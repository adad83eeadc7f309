//! Socket server: accepts clients, forwards their requests, fans out events

use geotrack_api::{
    ClientInfo, ClientRole, Command, ErrorCode, ErrorInfo, Event, Request, Response,
};
use geotrack_util::ClientId;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{IpcError, IpcResult};

const EVENT_BUFFER: usize = 256;

/// What the server hands to the daemon
#[derive(Debug)]
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        info: ClientInfo,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

type ClientMap = Arc<RwLock<HashMap<ClientId, ClientHandle>>>;

struct ClientHandle {
    info: ClientInfo,
    response_tx: mpsc::UnboundedSender<String>,
    subscribed: bool,
}

pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: ClientMap,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl IpcServer {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one left by a previous run
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o660))?;

        info!(path = %self.socket_path.display(), "IPC server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Only the first caller gets the receiver
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IpcError::ServerError("Server not started".into()))?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = ClientId::new();
                    let uid = peer_uid(&stream);
                    let role = role_for_uid(uid, nix::unistd::getuid().as_raw());

                    let mut info = ClientInfo::new(role);
                    if let Some(uid) = uid {
                        info = info.with_uid(uid);
                    }

                    info!(client_id = %client_id, uid = ?uid, role = ?role, "Client connected");
                    self.register_client(stream, client_id, info).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn register_client(&self, stream: UnixStream, client_id: ClientId, info: ClientInfo) {
        let (read_half, write_half) = stream.into_split();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<String>();

        self.clients.write().await.insert(
            client_id.clone(),
            ClientHandle {
                info: info.clone(),
                response_tx: response_tx.clone(),
                subscribed: false,
            },
        );

        let _ = self.message_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            info,
        });

        tokio::spawn(read_requests(
            read_half,
            client_id.clone(),
            self.clients.clone(),
            self.message_tx.clone(),
            response_tx,
        ));

        tokio::spawn(write_outgoing(
            write_half,
            client_id,
            self.clients.clone(),
            self.message_tx.clone(),
            response_rx,
            self.event_tx.subscribe(),
        ));
    }

    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let json = serde_json::to_string(&response)?;

        let clients = self.clients.read().await;
        match clients.get(client_id) {
            Some(handle) => handle
                .response_tx
                .send(json)
                .map_err(|_| IpcError::ConnectionClosed),
            None => Err(IpcError::ConnectionClosed),
        }
    }

    /// Queue an event for every subscribed client
    pub fn broadcast_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    pub async fn get_client_info(&self, client_id: &ClientId) -> Option<ClientInfo> {
        let clients = self.clients.read().await;
        clients.get(client_id).map(|h| h.info.clone())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_requests(
    read_half: OwnedReadHalf,
    client_id: ClientId,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    response_tx: mpsc::UnboundedSender<String>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(client_id = %client_id, "Client disconnected (EOF)");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match serde_json::from_str::<Request>(trimmed) {
                    Ok(request) => {
                        let subscribe = match request.command {
                            Command::SubscribeEvents => Some(true),
                            Command::UnsubscribeEvents => Some(false),
                            _ => None,
                        };
                        if let Some(subscribed) = subscribe
                            && let Some(handle) = clients.write().await.get_mut(&client_id)
                        {
                            handle.subscribed = subscribed;
                        }

                        let _ = message_tx.send(ServerMessage::Request {
                            client_id: client_id.clone(),
                            request,
                        });
                    }
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "Invalid request");
                        let response = Response::error(
                            0,
                            ErrorInfo::new(ErrorCode::InvalidRequest, e.to_string()),
                        );
                        if let Ok(json) = serde_json::to_string(&response) {
                            let _ = response_tx.send(json);
                        }
                    }
                }
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Dropping the handle closes the response channel, which ends the writer
    unregister(&clients, &message_tx, &client_id).await;
}

async fn write_outgoing(
    mut writer: OwnedWriteHalf,
    client_id: ClientId,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    mut response_rx: mpsc::UnboundedReceiver<String>,
    mut event_rx: broadcast::Receiver<Event>,
) {
    loop {
        let line = tokio::select! {
            response = response_rx.recv() => match response {
                Some(json) => json,
                None => break,
            },
            event = event_rx.recv() => match event {
                Ok(event) => {
                    let subscribed = clients
                        .read()
                        .await
                        .get(&client_id)
                        .is_some_and(|h| h.subscribed);
                    if !subscribed {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode event");
                            continue;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(client_id = %client_id, skipped, "Client fell behind on events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let mut msg = line;
        msg.push('\n');
        if let Err(e) = writer.write_all(msg.as_bytes()).await {
            debug!(client_id = %client_id, error = %e, "Write error");
            break;
        }
    }

    unregister(&clients, &message_tx, &client_id).await;
}

async fn unregister(
    clients: &ClientMap,
    message_tx: &mpsc::UnboundedSender<ServerMessage>,
    client_id: &ClientId,
) {
    if clients.write().await.remove(client_id).is_some() {
        let _ = message_tx.send(ServerMessage::ClientDisconnected {
            client_id: client_id.clone(),
        });
    }
}

/// Root and the daemon's own user control tracking; anyone else may only observe
pub fn role_for_uid(peer_uid: Option<u32>, daemon_uid: u32) -> ClientRole {
    match peer_uid {
        Some(0) => ClientRole::Owner,
        Some(uid) if uid == daemon_uid => ClientRole::Owner,
        _ => ClientRole::Observer,
    }
}

fn peer_uid(stream: &UnixStream) -> Option<u32> {
    use std::os::unix::io::AsFd;

    let fd = stream.as_fd();
    nix::sys::socket::getsockopt(&fd, nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IpcClient;
    use geotrack_api::{EventPayload, ResponsePayload, ResponseResult};
    use std::time::Duration;
    use tempfile::tempdir;

    /// Bind a server and answer every request the way a minimal daemon would
    async fn spawn_server(socket_path: &Path) -> Arc<IpcServer> {
        let mut server = IpcServer::new(socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);

        let mut messages = server.take_message_receiver().await.unwrap();
        let responder = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                if let ServerMessage::Request { client_id, request } = msg {
                    let payload = match request.command {
                        Command::SubscribeEvents => ResponsePayload::Subscribed {
                            client_id: client_id.clone(),
                        },
                        Command::UnsubscribeEvents => ResponsePayload::Unsubscribed,
                        _ => ResponsePayload::Pong,
                    };
                    let _ = responder
                        .send_response(&client_id, Response::success(request.request_id, payload))
                        .await;
                }
            }
        });

        let runner = server.clone();
        tokio::spawn(async move {
            let _ = runner.run().await;
        });

        server
    }

    #[tokio::test]
    async fn test_server_start() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();
        assert!(socket_path.exists());

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn run_requires_start() {
        let dir = tempdir().unwrap();
        let server = IpcServer::new(dir.path().join("test.sock"));
        assert!(matches!(server.run().await, Err(IpcError::ServerError(_))));
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = spawn_server(&socket_path).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let response = client.send(Command::Ping).await.unwrap();
        assert_eq!(response.request_id, 1);
        assert!(matches!(response.result, ResponseResult::Ok(ResponsePayload::Pong)));

        let response = client.send(Command::Ping).await.unwrap();
        assert_eq!(response.request_id, 2);
    }

    #[tokio::test]
    async fn malformed_line_gets_error_reply() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = spawn_server(&socket_path).await;

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(b"{not json}\n").await.unwrap();

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: Response = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(response.request_id, 0);
        assert!(matches!(
            response.result,
            ResponseResult::Err(ErrorInfo { code: ErrorCode::InvalidRequest, .. })
        ));
    }

    #[tokio::test]
    async fn subscribed_clients_receive_events() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = spawn_server(&socket_path).await;

        let client = IpcClient::connect(&socket_path).await.unwrap();
        let mut events = client.subscribe().await.unwrap();

        server.broadcast_event(Event::new(EventPayload::RestartCanceled));
        let event = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event.payload, EventPayload::RestartCanceled));
    }

    #[tokio::test]
    async fn disconnect_unregisters_client() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = spawn_server(&socket_path).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        client.send(Command::Ping).await.unwrap();
        assert_eq!(server.client_count().await, 1);

        drop(client);
        for _ in 0..50 {
            if server.client_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(server.client_count().await, 0);
    }

    #[test]
    fn roles_follow_peer_uid() {
        assert_eq!(role_for_uid(Some(0), 1000), ClientRole::Owner);
        assert_eq!(role_for_uid(Some(1000), 1000), ClientRole::Owner);
        assert_eq!(role_for_uid(Some(1001), 1000), ClientRole::Observer);
        assert_eq!(role_for_uid(None, 1000), ClientRole::Observer);
    }
}
