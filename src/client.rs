use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::credentials::CredentialProvider;
use crate::domain::Service;
use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub method: Method,
    pub service: Service,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

pub trait ApiCall: Send + Sync {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, DeliveryError>;
}

impl<T: ApiCall + ?Sized> ApiCall for &T {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, DeliveryError> {
        (**self).call(request)
    }
}

pub struct HttpApiClient<P: CredentialProvider> {
    client: Client,
    credentials: P,
}

impl<P: CredentialProvider> HttpApiClient<P> {
    pub fn new(credentials: P) -> Result<Self, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dtk/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DeliveryError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| DeliveryError::Http(err.to_string()))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn builder(&self, request: &ApiRequest) -> RequestBuilder {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, DeliveryError> {
        let token = self.credentials.bearer()?;
        let response = self
            .builder(request)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .map_err(|err| DeliveryError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| DeliveryError::Http(err.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

impl<P: CredentialProvider> ApiCall for HttpApiClient<P> {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, DeliveryError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.send_once(request)?;
        if response.status != 401 {
            return Ok(response);
        }
        // A revoked or early-expired token: refresh once, then let the caller classify.
        tracing::debug!(url = %request.url, "401 received, refreshing credentials");
        self.credentials.invalidate();
        self.send_once(request)
    }
}
