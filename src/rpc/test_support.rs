//! In-process stand-in for the transcription backend.
//!
//! Speaks the framed protocol on an ephemeral `127.0.0.1` port, answers with
//! whatever the test's handler decides and keeps a log of what it saw.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::rpc::codec::{read_frame, write_frame};

/// What the fake backend does with one request.
pub enum Answer {
    /// Reply with this JSON payload.
    Json(Value),
    /// Reply with arbitrary payload bytes.
    Raw(Vec<u8>),
    /// Wait, then reply with this JSON payload.
    Delayed(Duration, Value),
    /// Hang up without replying.
    Hangup,
}

/// One entry of the wire log, in the order the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Request { conn: usize, body: Value },
    Response { conn: usize },
}

type Handler = dyn Fn(&Value) -> Answer + Send + Sync;

pub struct FakeBackend {
    addr: String,
    accepted: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<WireEvent>>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
    acceptor: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> Answer + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handler: Arc<Handler> = Arc::new(handler);
        let accepted = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let acceptor = {
            let accepted = Arc::clone(&accepted);
            let log = Arc::clone(&log);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let conn = accepted.fetch_add(1, Ordering::SeqCst);
                    let task = tokio::spawn(serve(
                        stream,
                        conn,
                        Arc::clone(&handler),
                        Arc::clone(&log),
                    ));
                    connections.lock().unwrap().push(task);
                }
            })
        };

        Self {
            addr,
            accepted,
            log,
            connections,
            acceptor,
        }
    }

    /// Answer every request with the same JSON.
    pub async fn constant(body: Value) -> Self {
        Self::start(move |_| Answer::Json(body.clone())).await
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<WireEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.log()
            .into_iter()
            .filter_map(|e| match e {
                WireEvent::Request { body, .. } => Some(body),
                WireEvent::Response { .. } => None,
            })
            .collect()
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        for task in self.connections.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.acceptor.abort();
        self.drop_connections();
    }
}

async fn serve(
    mut stream: TcpStream,
    conn: usize,
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<WireEvent>>>,
) {
    loop {
        let Ok(payload) = read_frame(&mut stream, u64::MAX).await else {
            return;
        };
        let body: Value = serde_json::from_slice(&payload).unwrap_or(Value::Null);
        log.lock().unwrap().push(WireEvent::Request {
            conn,
            body: body.clone(),
        });

        let reply = match handler(&body) {
            Answer::Json(v) => serde_json::to_vec(&v).unwrap(),
            Answer::Raw(bytes) => bytes,
            Answer::Delayed(delay, v) => {
                tokio::time::sleep(delay).await;
                serde_json::to_vec(&v).unwrap()
            }
            Answer::Hangup => return,
        };

        if write_frame(&mut stream, &reply).await.is_err() {
            return;
        }
        log.lock().unwrap().push(WireEvent::Response { conn });
    }
}
