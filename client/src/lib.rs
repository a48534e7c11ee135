use endpoint::Endpoint;
use kernel::{CreateResource, ErrorReply, RepairReport, Resource, UpdateResource};
use reqwest::{Client, Response};
use thiserror::Error;

pub mod endpoint;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server uri '{0}'")]
    InvalidUri(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server replied {status}: {message}")]
    Server {
        status: u16,
        error: String,
        message: String,
    },
}

impl ClientError {
    /// Protocol error kind reported by the server, e.g. `not_found`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Server { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Speaks the Euphony protocol to a single drywall server.
#[derive(Clone)]
pub struct DrywallClient {
    http: Client,
    endpoint: Endpoint,
}

impl DrywallClient {
    pub fn new(uri: &str) -> Result<Self, ClientError> {
        let endpoint = Endpoint::new(uri).ok_or_else(|| ClientError::InvalidUri(uri.to_owned()))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
        })
    }

    pub async fn create(
        &self,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<Resource, ClientError> {
        let body = CreateResource {
            name: name.to_owned(),
            content: kernel::encode_content(content),
            content_type: content_type.to_owned(),
        };
        let response = self
            .http
            .post(self.endpoint.resources())
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn update(
        &self,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<Resource, ClientError> {
        let body = UpdateResource {
            content: kernel::encode_content(content),
            content_type: content_type.to_owned(),
        };
        let response = self
            .http
            .put(self.endpoint.resource(name))
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn get(&self, name: &str) -> Result<Resource, ClientError> {
        let response = self.http.get(self.endpoint.resource(name)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Raw payload without the base64 wrapping.
    pub async fn content(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.http.get(self.endpoint.content(name)).send().await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    pub async fn delete(&self, name: &str) -> Result<(), ClientError> {
        let response = self.http.delete(self.endpoint.resource(name)).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Resource>, ClientError> {
        let response = self.http.get(self.endpoint.resources()).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn repair(&self) -> Result<RepairReport, ClientError> {
        let response = self.http.post(self.endpoint.repair()).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Passes successful responses through and turns the rest into [`ClientError::Server`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await?;
    let (error, message) = match parse_error_reply(&text) {
        Some(reply) => (reply.error, reply.message),
        None => (String::from("unknown"), text),
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        error,
        message,
    })
}

fn parse_error_reply(text: &str) -> Option<ErrorReply> {
    serde_json::from_str(text).ok()
}
