//! HTTP implementation of [`EmulatorService`].
//!
//! Each call maps to one route of the emulator server. The server answers
//! most requests, successful or not, with an [`Envelope`]; a `success = false`
//! envelope is surfaced as [`ClientError::Remote`] with the server's message
//! and code untouched. A few failures (out of credits on execute, a rejected
//! upload) come back as a bare error page instead; those also become
//! [`ClientError::Remote`], keyed by the HTTP status.

use super::EmulatorService;
use crate::config::ServerConfig;
use crate::protocol::{
    DebugStartRequest, Envelope, ExecuteRequest, ExecutionOutcome, HistoricalRun,
    ProgramCommands, ProgramInfo, ProgramSummary, UserInfo,
};
use crate::runtime::cost::Architecture;
use crate::{ClientError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Header carrying the opaque user identifier.
pub const USER_ID_HEADER: &str = "X-User-Id";

type Query<'a> = &'a [(&'a str, String)];

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid title pattern"))
}

/// Rejection for a non-2xx reply that carried no envelope. The message is
/// the error page title, else the plain-text body, else the status reason.
fn rejection(status: StatusCode, body: &[u8]) -> ClientError {
    let text = String::from_utf8_lossy(body);
    let title = title_pattern()
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty());
    let plain = Some(text.trim()).filter(|t| !t.is_empty() && !t.starts_with('<'));
    let message = title
        .or(plain)
        .or(status.canonical_reason())
        .unwrap_or("Unknown status")
        .to_string();
    ClientError::Remote {
        message,
        code: i32::from(status.as_u16()),
    }
}

pub struct HttpService {
    client: Client,
    base_url: String,
    user: Option<String>,
}

impl HttpService {
    pub fn new(config: &ServerConfig, user: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, query: Query<'_>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url).query(query);
        if let Some(user) = &self.user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder
    }

    /// Issue the request; returns its label, the status and the raw body.
    async fn exchange(&self, builder: RequestBuilder) -> Result<(String, StatusCode, Vec<u8>)> {
        let request = builder.build()?;
        let label = format!("{} {}", request.method(), request.url().path());
        debug!("-> {}", label);

        let response = self.client.execute(request).await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();
        debug!("<- {} ({}, {} bytes)", label, status, bytes.len());
        Ok((label, status, bytes))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Envelope<T>> {
        let (label, status, bytes) = self.exchange(builder).await?;

        let mut de = serde_json::Deserializer::from_slice(&bytes);
        match serde_path_to_error::deserialize::<_, Envelope<T>>(&mut de) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(rejection(status, &bytes)),
            Err(e) => Err(ClientError::Decode(format!(
                "{} at '{}': {}",
                label,
                e.path(),
                e.inner()
            ))),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T> {
        self.send(self.request(Method::GET, path, query))
            .await?
            .into_data()
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        query: Query<'_>,
    ) -> Result<T> {
        self.send(self.request(Method::POST, path, query).json(body))
            .await?
            .into_data()
    }

    /// Call a route whose payload is irrelevant; only the envelope status
    /// matters.
    async fn call(&self, method: Method, path: &str, query: Query<'_>) -> Result<()> {
        self.send::<serde_json::Value>(self.request(method, path, query))
            .await?
            .into_result()
            .map(|_| ())
    }
}

#[async_trait]
impl EmulatorService for HttpService {
    async fn bind_active_program(&self, name: &str) -> Result<()> {
        self.call(
            Method::POST,
            "/program/set",
            &[("programName", name.to_string())],
        )
        .await
    }

    async fn check_runnable(&self, expansion_level: u32, architecture: Architecture) -> Result<()> {
        self.call(
            Method::GET,
            "/program/runnability",
            &[
                ("expansionLevel", expansion_level.to_string()),
                ("architecture", architecture.label().to_string()),
            ],
        )
        .await
    }

    async fn execute(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
    ) -> Result<ExecutionOutcome> {
        let body = ExecuteRequest {
            expansion_level,
            architecture,
            input: input.to_vec(),
        };
        self.post("/program/execute", &body, &[]).await
    }

    async fn debug_start(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
        breakpoints: &[u32],
    ) -> Result<ExecutionOutcome> {
        let body = DebugStartRequest {
            expansion_level,
            architecture,
            input: input.to_vec(),
            breakpoints: breakpoints.to_vec(),
        };
        self.post("/program/debug/start", &body, &[]).await
    }

    async fn debug_step(&self) -> Result<ExecutionOutcome> {
        self.send(self.request(Method::POST, "/program/debug/step", &[]))
            .await?
            .into_data()
    }

    async fn debug_step_back(&self) -> Result<ExecutionOutcome> {
        self.send(self.request(Method::DELETE, "/program/debug/step", &[]))
            .await?
            .into_data()
    }

    async fn debug_continue(&self) -> Result<ExecutionOutcome> {
        self.send(self.request(Method::POST, "/program/debug/continue", &[]))
            .await?
            .into_data()
    }

    async fn debug_stop(&self) -> Result<i64> {
        // Older servers reply with no payload; treat it as zero cost.
        Ok(self
            .send::<i64>(self.request(Method::POST, "/program/debug/stop", &[]))
            .await?
            .into_result()?
            .unwrap_or(0))
    }

    async fn debug_add_breakpoint(&self, index: u32) -> Result<()> {
        self.call(
            Method::POST,
            "/program/debug/breakpoint",
            &[("index", index.to_string())],
        )
        .await
    }

    async fn debug_remove_breakpoint(&self, index: u32) -> Result<()> {
        self.call(
            Method::DELETE,
            "/program/debug/breakpoint",
            &[("index", index.to_string())],
        )
        .await
    }

    async fn program_commands(&self, expansion_level: u32) -> Result<ProgramCommands> {
        self.get(
            "/program/commands",
            &[("expansionLevel", expansion_level.to_string())],
        )
        .await
    }

    async fn program_summary(&self, expansion_level: u32) -> Result<ProgramSummary> {
        self.get(
            "/program/summary",
            &[("expansionLevel", expansion_level.to_string())],
        )
        .await
    }

    async fn command_history(&self, expansion_level: u32, index: u32) -> Result<Vec<String>> {
        self.get(
            "/command/history",
            &[
                ("index", index.to_string()),
                ("expansionLevel", expansion_level.to_string()),
            ],
        )
        .await
    }

    async fn upload_program(&self, file_name: &str, contents: Vec<u8>) -> Result<String> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("application/xml")?;
        let form = Form::new().part("file", part);
        let (label, status, body) = self
            .exchange(self.request(Method::POST, "/program/upload", &[]).multipart(form))
            .await?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        debug!("{} accepted", label);
        Ok(String::from_utf8_lossy(&body).trim().to_string())
    }

    async fn dependency_chain(&self, name: &str) -> Result<Vec<String>> {
        self.get("/dependencies", &[("name", name.to_string())]).await
    }

    async fn programs_using(&self, function: &str) -> Result<Vec<String>> {
        self.get("/function/used-by", &[("name", function.to_string())])
            .await
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        self.send(self.request(Method::POST, "/user/all", &[]))
            .await?
            .into_data()
    }

    async fn list_programs(&self) -> Result<Vec<ProgramInfo>> {
        self.get("/program/information", &[]).await
    }

    async fn list_functions(&self) -> Result<Vec<ProgramInfo>> {
        self.get("/function/information", &[]).await
    }

    async fn user_statistics(&self, user: &str) -> Result<Vec<HistoricalRun>> {
        self.get("/user/statistics", &[("user", user.to_string())])
            .await
    }

    async fn user_credits(&self) -> Result<i64> {
        self.get("/user/credits", &[]).await
    }

    async fn add_credits(&self, amount: i64) -> Result<()> {
        self.call(
            Method::POST,
            "/user/credits",
            &[("credits", amount.to_string())],
        )
        .await
    }

    async fn max_expansion_level(&self) -> Result<u32> {
        self.get("/program/level", &[]).await
    }

    async fn input_variables(&self) -> Result<Vec<String>> {
        self.get("/program/input", &[]).await
    }
}
