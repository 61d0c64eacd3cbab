use std::time::Duration;

use reqwest::{redirect, Client};

use crate::{
    error::{Error, Result},
    readiness::{is_ready_status, CheckOutcome, HttpCheck},
};

/// Readiness check over plain HTTP GET.
///
/// Redirects are not followed: a 3xx answer already counts as ready.
#[derive(Debug, Clone)]
pub struct ReqwestCheck {
    client: Client,
}

impl ReqwestCheck {
    /// Build the underlying HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|err| Error::Internal(format!("Failed to create HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpCheck for ReqwestCheck {
    async fn check(&self, url: &str, limit: Duration) -> CheckOutcome {
        match self.client.get(url).timeout(limit).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if is_ready_status(status) {
                    CheckOutcome::Ready(status)
                } else {
                    CheckOutcome::NotReady(format!("status {status}"))
                }
            }
            Err(err) => CheckOutcome::NotReady(err.to_string()),
        }
    }
}
