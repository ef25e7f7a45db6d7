//! In-memory [`Connector`] that plays back canned replies and records what
//! the client sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::{ClientConfig, Credentials};
use crate::error::{BoxError, Result};
use crate::stash::client::StashClient;
use crate::stash::transport::{ApiRequest, ApiResponse, Connection, Connector};

pub(crate) const TIMEOUT: Duration = Duration::from_millis(50);

pub(crate) enum Reply {
    Respond(StatusCode, String),
    /// Empty response with a reason phrase of its own.
    Reason(StatusCode, String),
    Refuse,
    /// Never answers; the client timeout has to fire.
    Hang,
}

impl Reply {
    pub(crate) fn ok(body: &str) -> Self {
        Reply::Respond(StatusCode::OK, body.to_string())
    }

    pub(crate) fn status(status: StatusCode) -> Self {
        Reply::Respond(status, String::new())
    }

    pub(crate) fn reason(status: StatusCode, status_text: &str) -> Self {
        Reply::Reason(status, status_text.to_string())
    }
}

#[derive(Clone, Default)]
pub(crate) struct Probe {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl Probe {
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request was sent")
    }
}

pub(crate) struct ScriptedConnector {
    replies: Mutex<VecDeque<Reply>>,
    probe: Probe,
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");

        Ok(Box::new(ScriptedConnection {
            reply: Mutex::new(Some(reply)),
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedConnection {
    reply: Mutex<Option<Reply>>,
    probe: Probe,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, BoxError> {
        self.probe.requests.lock().unwrap().push(request);
        let reply = self.reply.lock().unwrap().take();

        match reply {
            Some(Reply::Respond(status, body)) => Ok(ApiResponse::new(status, body)),
            Some(Reply::Reason(status, status_text)) => {
                Ok(ApiResponse::with_status_text(status, status_text, ""))
            }
            Some(Reply::Refuse) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err("scripted connection hung".into())
            }
            None => Err("connection already used".into()),
        }
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn scripted_client(replies: Vec<Reply>) -> (StashClient, Probe) {
    let probe = Probe::default();
    let connector = ScriptedConnector {
        replies: Mutex::new(replies.into()),
        probe: probe.clone(),
    };
    let config = ClientConfig {
        base_url: "https://stash.example.com".to_string(),
        credentials: Credentials::new("login", "password"),
        timeout: TIMEOUT,
        verify_tls: true,
    };

    let client = StashClient::with_connector(config, connector).expect("valid test config");
    (client, probe)
}
