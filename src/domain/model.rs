use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A forwarded TCP/UDP port, always within 1..=65535.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    pub const MIN: Port = Port(1);
    pub const MAX: Port = Port(u16::MAX);

    pub fn new(value: u16) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    #[serde(alias = "OPTION")]
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Username/password of one service, only ever used as template variables.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One HTTP call of a service group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStep {
    #[serde(default)]
    pub method: Method,
    pub url: String,
    #[serde(default, alias = "content-type")]
    pub content_type: Option<String>,
    #[serde(default, alias = "payload")]
    pub body: Option<String>,
}

impl RequestStep {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }
}

/// Ordered chain of requests sharing credentials, cookies and forwarded headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroup {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub requests: Vec<RequestStep>,
}

/// Service groups keyed by name. Iteration order is an implementation detail.
pub type ServiceMap = BTreeMap<String, ServiceGroup>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub service: String,
    pub method: Method,
    /// URL template text as configured; the rendered URL may carry credentials.
    pub path: String,
    pub status: StepStatus,
    /// 1-based position of the step within its service group.
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn pending(service: &str, step: usize, request: &RequestStep) -> Self {
        Self {
            service: service.to_string(),
            method: request.method,
            path: request.url.clone(),
            status: StepStatus::Pending,
            step,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn succeeded(mut self) -> Self {
        self.status = StepStatus::Success;
        self.at = Utc::now();
        self
    }

    pub fn failed(mut self, error: impl fmt::Display) -> Self {
        self.status = StepStatus::Failed;
        self.error = Some(error.to_string());
        self.at = Utc::now();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    Step(StatusUpdate),
    /// Terminal signal of one dispatch.
    Completed { port: Port, errors: usize },
}
