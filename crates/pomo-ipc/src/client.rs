//! IPC client implementation

use pomo_api::{Command, Event, Request, Response, ResponsePayload, ResponseResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::{IpcError, IpcResult};

/// Any line pomod may write: responses carry a `request_id`, events do not
#[derive(Deserialize)]
#[serde(untagged)]
enum Incoming {
    Response(Response),
    Event(Event),
}

/// Read one NDJSON line and decode it
async fn read_message<T: DeserializeOwned>(reader: &mut BufReader<OwnedReadHalf>) -> IpcResult<T> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::ConnectionClosed);
    }
    Ok(serde_json::from_str(line.trim())?)
}

/// Connection to pomod. Requests are answered in order, one at a time.
pub struct IpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
    /// Events that arrived while waiting for a response
    pending: VecDeque<Event>,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let (read_half, write_half) = UnixStream::connect(socket_path).await?.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
            pending: VecDeque::new(),
        })
    }

    /// Send a command and return the raw response, error results included.
    ///
    /// Events pushed ahead of the response are kept for the event stream.
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut json = serde_json::to_string(&Request::new(request_id, command))?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;

        loop {
            match read_message(&mut self.reader).await? {
                Incoming::Response(response) if response.request_id == request_id => {
                    return Ok(response);
                }
                Incoming::Response(response) => {
                    debug!(
                        request_id = response.request_id,
                        expected = request_id,
                        "Skipping stale response"
                    );
                }
                Incoming::Event(event) => self.pending.push_back(event),
            }
        }
    }

    /// Like [`send`](Self::send), but error responses become [`IpcError::Rejected`]
    pub async fn call(&mut self, command: Command) -> IpcResult<ResponsePayload> {
        match self.send(command).await?.result {
            ResponseResult::Ok(payload) => Ok(payload),
            ResponseResult::Err(e) => Err(IpcError::Rejected(e)),
        }
    }

    /// Subscribe and turn this connection into an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        self.call(Command::SubscribeEvents).await?;

        Ok(EventStream {
            reader: self.reader,
            _writer: self.writer,
            pending: self.pending,
        })
    }
}

/// Events pushed by pomod after a subscription
pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    // Dropping the write half would look like a disconnect to the server
    _writer: OwnedWriteHalf,
    pending: VecDeque<Event>,
}

impl EventStream {
    pub async fn next(&mut self) -> IpcResult<Event> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        read_message(&mut self.reader).await
    }
}
