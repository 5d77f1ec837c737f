//! Letta agent client with SSE streaming support.

use std::future::Future;
use std::io;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use letta_protocol::{Message, ResponseEvent, StreamingResponse};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::accumulator::ResponseAccumulator;
use crate::config::{Credentials, LettaConfig};
use crate::decoder::decode_chunks;
use crate::error::{status_error, LettaError, Result, TransportError};
use crate::observer::{FnObserver, NoopObserver, ResponseObserver};
use crate::request::{build_payload, ChatRequest, StreamPayload};
use crate::sse::sse_lines;

pub const PASSWORD_HEADER: &str = "X-BARE-PASSWORD";

/// Letta agent client.
///
/// Holds configuration only. Every call builds its own HTTP client, which
/// is dropped together with the connection when the call ends.
#[derive(Debug, Clone)]
pub struct LettaClient {
    config: LettaConfig,
}

/// Build an HTTP client for one call: configured timeouts, no idle pooling.
pub(crate) fn build_http_client(config: &LettaConfig, url: &str) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|source| {
            TransportError::Connection {
                url: url.to_string(),
                source,
            }
            .into()
        })
}

/// Pass through 2xx responses; turn anything else into an error carrying
/// the body.
pub(crate) async fn ensure_success(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(url, %status, body = %body, "agent returned an error");
    Err(status_error(url, status, body))
}

impl LettaClient {
    pub fn new(config: LettaConfig) -> Self {
        Self { config }
    }

    /// Client configured from the config file and `LETTA_*` variables.
    pub fn from_env() -> Self {
        Self::new(LettaConfig::load())
    }

    pub fn config(&self) -> &LettaConfig {
        &self.config
    }

    /// Send a request and return a stream of response events.
    ///
    /// Yields one [`ResponseEvent::Update`] per snapshot change and ends
    /// with [`ResponseEvent::Completed`], or with a single error. Dropping
    /// the stream closes the connection.
    pub fn stream(
        &self,
        request: &ChatRequest,
    ) -> impl Stream<Item = Result<ResponseEvent>> + Send + 'static {
        let config = self.config.clone();
        let request = request.clone();

        stream! {
            // Credentials are checked before anything touches the network.
            let credentials = match config.credentials().await {
                Ok(credentials) => credentials,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let url = match config.stream_url(&credentials.agent_id) {
                Ok(url) => url,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let payload = build_payload(&request.messages());

            let http = match build_http_client(&config, &url) {
                Ok(http) => http,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let response = match send_request(&http, &url, &credentials, &payload).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let accumulator = ResponseAccumulator::from_config(&config);
            let events = response_events(Box::pin(response.bytes_stream()), accumulator);
            let mut events = Box::pin(events);

            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => yield Ok(event),
                    Err(source) => {
                        yield Err(TransportError::Stream { url: url.clone(), source }.into());
                        return;
                    }
                }
            }
        }
    }

    /// Send a request and wait for the final content.
    pub async fn respond(&self, request: &ChatRequest) -> Result<String> {
        self.respond_with(request, &mut NoopObserver).await
    }

    /// Send a request, notifying `observer` of every snapshot change.
    ///
    /// The observer is awaited before the next chunk is read.
    pub async fn respond_with<O>(&self, request: &ChatRequest, observer: &mut O) -> Result<String>
    where
        O: ResponseObserver + ?Sized,
    {
        let mut events = std::pin::pin!(self.stream(request));
        let mut content = String::new();

        while let Some(event) = events.next().await {
            match event? {
                ResponseEvent::Update(snapshot) => {
                    observer.on_update(&snapshot).await;
                    content = snapshot.content;
                }
                ResponseEvent::Completed(final_content) => return Ok(final_content),
            }
        }

        Ok(content)
    }

    /// Like [`respond_with`](Self::respond_with), abandoned as soon as
    /// `cancel` completes.
    ///
    /// On cancellation the connection is dropped, the observer is not called
    /// again and partial content is discarded.
    pub async fn respond_until<O, F>(
        &self,
        request: &ChatRequest,
        observer: &mut O,
        cancel: F,
    ) -> Result<String>
    where
        O: ResponseObserver + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;

            () = cancel => {
                debug!("call cancelled");
                Err(LettaError::Cancelled)
            }
            result = self.respond_with(request, observer) => result,
        }
    }

    /// Synchronous form for callers outside an async runtime.
    ///
    /// Fails with [`LettaError::Runtime`] when called from within a tokio
    /// runtime.
    pub fn respond_blocking<O>(&self, request: &ChatRequest, observer: &mut O) -> Result<String>
    where
        O: ResponseObserver + ?Sized,
    {
        if Handle::try_current().is_ok() {
            return Err(LettaError::Runtime(io::Error::other(
                "respond_blocking called from within an async runtime",
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.respond_with(request, observer))
    }
}

/// Fold a raw SSE byte stream into response events.
///
/// This is the decode/accumulate half of a call, independent of HTTP.
pub fn response_events<S, E>(
    bytes: S,
    accumulator: ResponseAccumulator,
) -> impl Stream<Item = std::result::Result<ResponseEvent, E>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    stream! {
        let mut accumulator = accumulator;
        let mut chunks = Box::pin(decode_chunks(sse_lines(bytes)));

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    if accumulator.apply(chunk) {
                        yield Ok(ResponseEvent::Update(accumulator.snapshot().clone()));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        yield Ok(ResponseEvent::Completed(accumulator.into_content()));
    }
}

async fn send_request(
    http: &Client,
    url: &str,
    credentials: &Credentials,
    payload: &StreamPayload,
) -> Result<Response> {
    debug!(url, messages = payload.messages.len(), "sending request");

    let response = http
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "text/event-stream")
        .header(PASSWORD_HEADER, format!("password {}", credentials.password))
        .json(payload)
        .send()
        .await
        .map_err(|source| TransportError::Connection {
            url: url.to_string(),
            source,
        })?;

    ensure_success(url, response).await
}

fn chat_request(message: &str, system_prompt: Option<&str>, history: &[Message]) -> ChatRequest {
    let mut request = ChatRequest::new(message).with_history(history.to_vec());
    if let Some(system_prompt) = system_prompt {
        request = request.with_system_prompt(system_prompt);
    }
    request
}

/// Ask the agent configured by the environment and return its reply.
pub async fn respond(
    message: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    observer: Option<&mut dyn ResponseObserver>,
) -> Result<String> {
    respond_using(LettaConfig::load(), message, system_prompt, history, observer).await
}

/// [`respond`] against an explicit configuration.
pub async fn respond_using(
    config: LettaConfig,
    message: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    observer: Option<&mut dyn ResponseObserver>,
) -> Result<String> {
    let client = LettaClient::new(config);
    let request = chat_request(message, system_prompt, history);

    match observer {
        Some(observer) => client.respond_with(&request, observer).await,
        None => client.respond(&request).await,
    }
}

/// Blocking form of [`respond`] with an optional synchronous handler.
pub fn respond_blocking(
    message: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    handler: Option<&mut (dyn FnMut(&StreamingResponse) + Send)>,
) -> Result<String> {
    respond_blocking_using(LettaConfig::load(), message, system_prompt, history, handler)
}

/// [`respond_blocking`] against an explicit configuration.
pub fn respond_blocking_using(
    config: LettaConfig,
    message: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    handler: Option<&mut (dyn FnMut(&StreamingResponse) + Send)>,
) -> Result<String> {
    let client = LettaClient::new(config);
    let request = chat_request(message, system_prompt, history);

    match handler {
        Some(handler) => client.respond_blocking(&request, &mut FnObserver(handler)),
        None => client.respond_blocking(&request, &mut NoopObserver),
    }
}
