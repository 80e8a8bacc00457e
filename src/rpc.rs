//! Connect-RPC transport over HTTP.
//!
//! The drive service exposes Connect endpoints; this module speaks the
//! protocol's JSON codec. Unary calls are plain `POST` + JSON bodies.
//! Streaming calls (both directions) use enveloped frames: one flag byte,
//! a big-endian `u32` payload length, then the payload; flag bit `0x02`
//! marks the end-of-stream frame, which may carry a Connect error object.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::config as cfg;
use crate::schema::drive as drv;

const CONNECT_PROTOCOL_HEADER: &str = "connect-protocol-version";
const CONNECT_PROTOCOL_VERSION: &str = "1";
const UNARY_CONTENT_TYPE: &str = "application/json";
const STREAM_CONTENT_TYPE: &str = "application/connect+json";

const END_STREAM_FLAG: u8 = 0x02;
const FRAME_HEADER_LEN: usize = 5;

/// Shared HTTP plumbing for the per-service clients.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct ConnectError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Transport {
    pub(crate) fn new(base_url: &str) -> Self {
        Transport {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn route(&self, service: &str, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, service, method)
    }

    pub(crate) async fn unary<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.route(service, method);
        debug!(%url, "unary call");

        let mut builder = self
            .http
            .post(&url)
            .header(CONNECT_PROTOCOL_HEADER, CONNECT_PROTOCOL_VERSION)
            .header(reqwest::header::CONTENT_TYPE, UNARY_CONTENT_TYPE)
            .json(request);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(connect_error(method, response).await);
        }
        Ok(response.json().await?)
    }

    /// Issues a server-streaming call and decodes the enveloped response
    /// frames lazily. The stream ends when the remote side sends its
    /// end-of-stream frame; dropping the stream cancels the call.
    pub(crate) async fn server_stream<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<impl Stream<Item = Result<Resp>> + Unpin>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.route(service, method);
        debug!(%url, "server-streaming call");

        let body = encode_frame(0, &serde_json::to_vec(request)?);
        let response = self
            .http
            .post(&url)
            .header(CONNECT_PROTOCOL_HEADER, CONNECT_PROTOCOL_VERSION)
            .header(reqwest::header::CONTENT_TYPE, STREAM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(connect_error(method, response).await);
        }

        let method = method.to_owned();
        let frames = futures::stream::unfold(
            (response.bytes_stream(), Vec::new(), false, method),
            |(mut body, mut buf, done, method)| async move {
                if done {
                    return None;
                }
                loop {
                    if let Some((flags, payload)) = take_frame(&mut buf) {
                        if flags & END_STREAM_FLAG != 0 {
                            return match end_frame_error(&method, &payload) {
                                None => None,
                                Some(err) => Some((Err(err), (body, buf, true, method))),
                            };
                        }
                        let item = serde_json::from_slice::<Resp>(&payload).map_err(Error::from);
                        return Some((item, (body, buf, false, method)));
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            return Some((Err(Error::Transport(e)), (body, buf, true, method)));
                        }
                        None => {
                            if buf.is_empty() {
                                return None;
                            }
                            return Some((
                                Err(Error::Stream("truncated frame".into())),
                                (body, buf, true, method),
                            ));
                        }
                    }
                }
            },
        );
        Ok(Box::pin(frames))
    }

    /// Issues a client-streaming call with a pre-collected frame sequence
    /// and decodes the single enveloped response message.
    pub(crate) async fn client_stream<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        frames: &[Req],
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = self.route(service, method);
        debug!(%url, frames = frames.len(), "client-streaming call");

        let mut body = Vec::new();
        for frame in frames {
            body.extend_from_slice(&encode_frame(0, &serde_json::to_vec(frame)?));
        }

        let response = self
            .http
            .post(&url)
            .header(CONNECT_PROTOCOL_HEADER, CONNECT_PROTOCOL_VERSION)
            .header(reqwest::header::CONTENT_TYPE, STREAM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(connect_error(method, response).await);
        }

        let mut buf = response.bytes().await?.to_vec();
        let mut message: Option<Resp> = None;
        while let Some((flags, payload)) = take_frame(&mut buf) {
            if flags & END_STREAM_FLAG != 0 {
                if let Some(err) = end_frame_error(method, &payload) {
                    return Err(err);
                }
                break;
            }
            message = Some(serde_json::from_slice(&payload)?);
        }
        message.ok_or_else(|| Error::Stream(format!("{method}: no response message")))
    }
}

async fn connect_error(method: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ConnectError>(&body) {
        Ok(err) if !err.code.is_empty() || !err.message.is_empty() => Error::Rpc {
            method: method.to_owned(),
            code: err.code,
            message: err.message,
        },
        _ => Error::Rpc {
            method: method.to_owned(),
            code: status.as_str().to_owned(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned(),
        },
    }
}

fn encode_frame(flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.push(flags);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Removes one complete frame from the front of `buf`, if present.
fn take_frame(buf: &mut Vec<u8>) -> Option<(u8, Vec<u8>)> {
    if buf.len() < FRAME_HEADER_LEN {
        return None;
    }
    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if buf.len() < FRAME_HEADER_LEN + len {
        return None;
    }
    let flags = buf[0];
    let payload = buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len].to_vec();
    buf.drain(..FRAME_HEADER_LEN + len);
    Some((flags, payload))
}

/// Interprets an end-of-stream frame; `None` means a clean close.
fn end_frame_error(method: &str, payload: &[u8]) -> Option<Error> {
    if payload.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    let err = value.get("error")?;
    let code = err.get("code").and_then(|c| c.as_str()).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    Some(Error::Rpc {
        method: method.to_owned(),
        code: code.to_owned(),
        message: message.to_owned(),
    })
}

/// Client for `health.v1.HealthService`.
#[derive(Debug, Clone)]
pub struct HealthClient {
    transport: Transport,
}

impl HealthClient {
    const SERVICE: &'static str = "health.v1.HealthService";

    pub fn new(base_url: &str) -> Self {
        HealthClient {
            transport: Transport::new(base_url),
        }
    }

    /// One liveness round-trip, bounded by `timeout`.
    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        let _: cfg::Empty = self
            .transport
            .unary(Self::SERVICE, "Ping", &cfg::Empty {}, Some(timeout))
            .await?;
        Ok(())
    }
}

/// Client for `config.v1.ConfigService`.
#[derive(Debug, Clone)]
pub struct ConfigClient {
    transport: Transport,
}

impl ConfigClient {
    const SERVICE: &'static str = "config.v1.ConfigService";

    pub fn new(base_url: &str) -> Self {
        ConfigClient {
            transport: Transport::new(base_url),
        }
    }

    /// Opens an empty configuration session.
    pub async fn new_session(&self) -> Result<cfg::Config> {
        self.transport
            .unary(Self::SERVICE, "New", &cfg::Empty {}, None)
            .await
    }

    /// Opens a session backed by a directory on the service host.
    pub async fn load(&self, source: &cfg::Source) -> Result<cfg::Config> {
        self.transport
            .unary(Self::SERVICE, "Load", source, None)
            .await
    }

    /// Opens a session from archive bytes streamed to the service.
    pub async fn upload(&self, frames: &[cfg::SourceUpload]) -> Result<cfg::Config> {
        self.transport
            .client_stream(Self::SERVICE, "Upload", frames)
            .await
    }

    /// Streams the configuration back as an archive bundle.
    pub async fn download(
        &self,
        bundle: &cfg::BundleConfig,
    ) -> Result<impl Stream<Item = Result<cfg::Bundle>> + Unpin> {
        self.transport
            .server_stream(Self::SERVICE, "Download", bundle)
            .await
    }

    pub async fn commit(&self, handle: &cfg::Config) -> Result<cfg::Empty> {
        self.transport
            .unary(Self::SERVICE, "Commit", handle, None)
            .await
    }

    pub async fn free(&self, handle: &cfg::Config) -> Result<cfg::Empty> {
        self.transport
            .unary(Self::SERVICE, "Free", handle, None)
            .await
    }

    /// Executes one encoded configuration operation.
    pub async fn do_op(&self, op: &cfg::Op) -> Result<cfg::Return> {
        self.transport.unary(Self::SERVICE, "Do", op, None).await
    }
}

/// Client for `drive.v1.DriveService`.
#[derive(Debug, Clone)]
pub struct DriveClient {
    transport: Transport,
}

impl DriveClient {
    const SERVICE: &'static str = "drive.v1.DriveService";

    pub fn new(base_url: &str) -> Self {
        DriveClient {
            transport: Transport::new(base_url),
        }
    }

    pub async fn new_drive(&self, request: &drv::DriveRequest) -> Result<drv::Drive> {
        self.transport
            .unary(Self::SERVICE, "New", request, None)
            .await
    }

    pub async fn plot(&self, request: &drv::PlotRequest) -> Result<drv::Course> {
        self.transport
            .unary(Self::SERVICE, "Plot", request, None)
            .await
    }

    pub async fn displace(&self, course: &drv::Course) -> Result<drv::Empty> {
        self.transport
            .unary(Self::SERVICE, "Displace", course, None)
            .await
    }

    /// Progress records for a running displacement; finite, closed by the
    /// remote side when the course completes or aborts.
    pub async fn progress(
        &self,
        course: &drv::Course,
    ) -> Result<impl Stream<Item = Result<drv::DisplacementProgress>> + Unpin> {
        self.transport
            .server_stream(Self::SERVICE, "Progress", course)
            .await
    }

    pub async fn abort(&self, course: &drv::Course) -> Result<drv::Empty> {
        self.transport
            .unary(Self::SERVICE, "Abort", course, None)
            .await
    }

    pub async fn free(&self, drive: &drv::Drive) -> Result<drv::Empty> {
        self.transport
            .unary(Self::SERVICE, "Free", drive, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let mut buf = encode_frame(0, br#"{"a":1}"#);
        buf.extend_from_slice(&encode_frame(END_STREAM_FLAG, b"{}"));

        let (flags, payload) = take_frame(&mut buf).unwrap();
        assert_eq!(flags, 0);
        assert_eq!(payload, br#"{"a":1}"#);

        let (flags, payload) = take_frame(&mut buf).unwrap();
        assert_eq!(flags, END_STREAM_FLAG);
        assert_eq!(payload, b"{}");
        assert!(buf.is_empty());
        assert!(take_frame(&mut buf).is_none());
    }

    #[test]
    fn partial_frames_are_left_in_the_buffer() {
        let full = encode_frame(0, b"0123456789");
        let mut buf = full[..7].to_vec();
        assert!(take_frame(&mut buf).is_none());
        buf.extend_from_slice(&full[7..]);
        let (_, payload) = take_frame(&mut buf).unwrap();
        assert_eq!(payload, b"0123456789");
    }

    #[test]
    fn end_frame_with_error_is_surfaced() {
        let payload = br#"{"error":{"code":"internal","message":"boom"}}"#;
        let err = end_frame_error("Progress", payload).unwrap();
        match err {
            Error::Rpc {
                method,
                code,
                message,
            } => {
                assert_eq!(method, "Progress");
                assert_eq!(code, "internal");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(end_frame_error("Progress", b"{}").is_none());
        assert!(end_frame_error("Progress", b"").is_none());
    }
}
