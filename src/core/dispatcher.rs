use crate::core::template::{render, TemplateContext};
use crate::domain::model::{Port, RequestStep, ServiceGroup, ServiceMap, StatusEvent, StatusUpdate};
use crate::domain::ports::{Dispatch, DispatchOutcome, StatusSink};
use crate::utils::error::{DispatchErrors, Result, StepError, SyncError};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderName};
use reqwest::{redirect, Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Response headers carried over to the following steps of the same group.
pub const FORWARD_HEADERS: &[HeaderName] = &[header::AUTHORIZATION];

/// Session artifacts of one group within one dispatch attempt.
#[derive(Default)]
struct ForwardState {
    jar: Jar,
    headers: HeaderMap,
}

impl ForwardState {
    fn absorb_cookies(&self, response: &Response) {
        let mut cookies = response.headers().get_all(header::SET_COOKIE).iter();
        self.jar.set_cookies(&mut cookies, response.url());
    }

    fn absorb_headers(&mut self, response: &Response) {
        for name in FORWARD_HEADERS {
            let values: Vec<_> = response.headers().get_all(name).iter().cloned().collect();
            if values.is_empty() {
                continue;
            }
            self.headers.remove(name);
            for value in values {
                self.headers.append(name.clone(), value);
            }
        }
    }
}

/// Where a redirect response points, if it should be followed.
fn redirect_target(response: &Response) -> Option<Result<Url>> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }

    let location = response.headers().get(header::LOCATION)?;
    let target = location
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|location| response.url().join(location).map_err(|e| e.to_string()))
        .map_err(|message| SyncError::RedirectError {
            url: response.url().to_string(),
            message,
        });
    Some(target)
}

/// Redirect hops followed within a single step.
pub const MAX_REDIRECTS: usize = 10;

/// Executes every service group's request chain for a port.
///
/// Groups run one after the other and steps within a group run in order.
/// A failing step aborts the rest of its own group only; HTTP error statuses
/// are not failures. Redirects are followed here rather than by the client so
/// that cookies set on intermediate hops land in the group's jar.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    client: Client,
}

impl RequestDispatcher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Uses `client` as is. It should not follow redirects itself, otherwise
    /// cookies set on intermediate hops are lost.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn run_group(
        &self,
        service: &str,
        group: &ServiceGroup,
        port: Port,
        status: &StatusSink,
    ) -> std::result::Result<(), StepError> {
        let context = TemplateContext::for_group(port, &group.credentials);
        let mut state = ForwardState::default();

        tracing::info!("🔁 Service {}: {} request(s)", service, group.requests.len());

        for (index, request) in group.requests.iter().enumerate() {
            let step = index + 1;
            let update = StatusUpdate::pending(service, step, request);
            status.send(StatusEvent::Step(update.clone())).await;

            match self.run_step(request, &context, &mut state).await {
                Ok(()) => {
                    status.send(StatusEvent::Step(update.succeeded())).await;
                }
                Err(source) => {
                    tracing::warn!(
                        "❌ {} step {} ({} {}) failed: {}",
                        service,
                        step,
                        request.method,
                        request.url,
                        source
                    );
                    status.send(StatusEvent::Step(update.failed(&source))).await;
                    return Err(StepError {
                        service: service.to_string(),
                        step,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    async fn run_step(
        &self,
        request: &RequestStep,
        context: &TemplateContext,
        state: &mut ForwardState,
    ) -> Result<()> {
        let rendered = render(&request.url, context)?;
        let url = Url::parse(&rendered).map_err(|source| SyncError::InvalidUrlError { source })?;

        let content_type = request.content_type.as_deref().filter(|c| !c.is_empty());
        let body = request.body.as_deref().filter(|b| !b.is_empty());
        let payload = match (content_type, body) {
            (Some(content_type), Some(body)) => Some((content_type, render(body, context)?)),
            (None, None) => None,
            (Some(content_type), None) => {
                return Err(SyncError::ConfigMismatchError {
                    message: format!("content type '{}' is set but no body found", content_type),
                })
            }
            (None, Some(_)) => {
                return Err(SyncError::ConfigMismatchError {
                    message: "body is set but no content type found".to_string(),
                })
            }
        };

        let origin = url.origin();
        let mut method: reqwest::Method = request.method.into();
        let mut url = url;
        let mut payload = payload;

        for _ in 0..=MAX_REDIRECTS {
            // Forwarded headers never leave the origin the step was aimed at.
            let headers = if url.origin() == origin {
                state.headers.clone()
            } else {
                HeaderMap::new()
            };
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers);
            if let Some(cookie) = state.jar.cookies(&url) {
                builder = builder.header(header::COOKIE, cookie);
            }
            if let Some((content_type, body)) = &payload {
                builder = builder
                    .header(header::CONTENT_TYPE, *content_type)
                    .body(body.clone());
            }

            let response = builder.send().await?;
            tracing::debug!("📡 {} {} -> {}", method, url, response.status());
            state.absorb_cookies(&response);

            let Some(next) = redirect_target(&response) else {
                state.absorb_headers(&response);
                return Ok(());
            };
            let next = next?;

            if matches!(
                response.status(),
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            ) && method != reqwest::Method::GET
                && method != reqwest::Method::HEAD
            {
                method = reqwest::Method::GET;
                payload = None;
            }
            tracing::debug!("↪️ Redirected to {}", next);
            url = next;
        }

        Err(SyncError::RedirectError {
            url: request.url.clone(),
            message: format!("stopped after {} redirects", MAX_REDIRECTS),
        })
    }
}

#[async_trait]
impl Dispatch for RequestDispatcher {
    async fn dispatch(
        &self,
        port: Port,
        services: &ServiceMap,
        status: &StatusSink,
    ) -> DispatchOutcome {
        let mut errors = DispatchErrors::new();

        for (service, group) in services {
            if let Err(error) = self.run_group(service, group, port, status).await {
                errors.push(error);
            }
        }

        status
            .send(StatusEvent::Completed {
                port,
                errors: errors.len(),
            })
            .await;

        DispatchOutcome { port, errors }
    }
}
