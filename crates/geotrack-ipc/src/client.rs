//! Client side of the socket protocol

use geotrack_api::{Command, Event, Request, Response, ResponseResult};
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use crate::{IpcError, IpcResult};

pub struct IpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
    /// Events that arrived while waiting for a response
    pending_events: VecDeque<Event>,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    /// Send a command and wait for its response
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut json = serde_json::to_string(&Request::new(request_id, command))?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;

        loop {
            let line = read_line(&mut self.reader).await?;
            if let Ok(response) = serde_json::from_str::<Response>(&line) {
                return Ok(response);
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => self.pending_events.push_back(event),
                Err(_) => return Err(IpcError::InvalidMessage(line)),
            }
        }
    }

    /// Subscribe and turn this connection into an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        let response = self.send(Command::SubscribeEvents).await?;
        if let ResponseResult::Err(e) = response.result {
            return Err(IpcError::ServerError(e.message));
        }

        Ok(EventStream {
            reader: self.reader,
            pending: self.pending_events,
        })
    }
}

pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    pending: VecDeque<Event>,
}

impl EventStream {
    pub async fn next(&mut self) -> IpcResult<Event> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        let line = read_line(&mut self.reader).await?;
        Ok(serde_json::from_str(&line)?)
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> IpcResult<String> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(IpcError::ConnectionClosed);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}
