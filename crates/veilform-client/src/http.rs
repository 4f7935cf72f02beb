//! JSON-over-HTTPS form service client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use veilform_core::{Envelope, FormDocument, FormId, FormResponse};

use crate::api::{
    ApiResponse, Existence, ExistenceFlag, ExistenceQuery, FormListing, FormSummary, LoginArgs,
    LoginResponse, ResponseListing, ResponseSummary, SubmissionReceipt, SubmitResponseBody,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::service::FormService;

/// Form service reached over HTTP
#[derive(Debug)]
pub struct HttpFormService {
    base_url: Url,
    http: Client,
    token: RwLock<Option<String>>,
}

impl HttpFormService {
    /// Create a client from configuration
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::Config(format!("invalid base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base URL cannot be a base: {}",
                config.base_url
            )));
        }

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("veilform-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            http,
            token: RwLock::new(config.auth_token),
        })
    }

    /// Currently held session token
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Forget the session token
    pub async fn logout(&self) {
        *self.token.write().await = None;
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> ClientResult<ApiResponse<T>> {
        let request = self.authorized(request).await;
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Services report failures through `err` even on error statuses
            if let Ok(ApiResponse { err: Some(err), .. }) =
                serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
            {
                if !err.is_empty() {
                    return Err(ClientError::Rejected(err));
                }
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(what.to_string()));
            }
            warn!(status = status.as_u16(), endpoint = what, "Service returned error status");
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::decode(format!("{} response: {}", what, e)))
    }
}

#[async_trait]
impl FormService for HttpFormService {
    async fn login(&self, args: LoginArgs) -> ClientResult<LoginResponse> {
        let request = self.http.post(self.endpoint(&["login"])).json(&args);
        let response: LoginResponse = self.send(request, "login").await?.require_data("login")?;

        if let Some(token) = &response.token {
            *self.token.write().await = Some(token.clone());
            info!("Logged in to form service");
        }
        Ok(response)
    }

    async fn identity_exists(&self, eoa: &str) -> ClientResult<Existence> {
        let request = self
            .http
            .post(self.endpoint(&["login", "eoa"]))
            .json(&ExistenceQuery { eoa });
        let flag: Option<ExistenceFlag> = self.send(request, "login/eoa").await?.into_data()?;
        Ok(Existence::from_flag(flag.and_then(|f| f.exists)))
    }

    async fn list_forms(&self) -> ClientResult<Vec<FormSummary>> {
        let request = self.http.get(self.endpoint(&["all", "form"]));
        let listing: Option<Vec<FormListing>> = self.send(request, "all/form").await?.into_data()?;
        Ok(listing
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.form)
            .collect())
    }

    async fn list_responses(&self) -> ClientResult<Vec<ResponseSummary>> {
        let request = self.http.get(self.endpoint(&["all", "response"]));
        let listing: Option<Vec<ResponseListing>> =
            self.send(request, "all/response").await?.into_data()?;
        Ok(listing
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.form_response)
            .collect())
    }

    async fn fetch_form(&self, form_id: &FormId) -> ClientResult<Envelope<FormDocument>> {
        let request = self.http.get(self.endpoint(&["form", form_id.as_str()]));
        let envelope: Envelope<FormDocument> = self
            .send(request, "form")
            .await?
            .into_data()?
            .ok_or_else(|| ClientError::NotFound(format!("form {}", form_id)))?;
        envelope.validate()?;
        debug!(form_id = %form_id, "Fetched form");
        Ok(envelope)
    }

    async fn fetch_response(
        &self,
        form_id: &FormId,
    ) -> ClientResult<Option<Envelope<FormResponse>>> {
        let request = self.http.get(self.endpoint(&["response", form_id.as_str()]));
        let envelope: Option<Envelope<FormResponse>> =
            match self.send(request, "response").await {
                Ok(response) => response.into_data()?,
                Err(ClientError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
        if let Some(envelope) = &envelope {
            envelope.validate()?;
        }
        Ok(envelope)
    }

    async fn submit_response(
        &self,
        response: &Envelope<FormResponse>,
    ) -> ClientResult<SubmissionReceipt> {
        let request = self
            .http
            .post(self.endpoint(&["response"]))
            .json(&SubmitResponseBody {
                form_response: response,
            });
        let receipt: Option<SubmissionReceipt> = self.send(request, "response").await?.into_data()?;
        let receipt = receipt.unwrap_or_default();
        info!(form_id = %response.payload.meta.form_id, "Response submitted");
        Ok(receipt)
    }
}
