//! Network driver for the generation endpoint.

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::message::ErrorMessage;
use crate::normalize::UpstreamMessage;
use crate::session::{StreamEvent, TurnRequest};
use crate::signature::{SignPayload, Signer};

pub const GENERATE_PATH: &str = "/api/generate";

/// JSON body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub messages: Vec<UpstreamMessage>,
    pub time: i64,
    pub pass: Option<String>,
    pub sign: String,
}

impl GenerateRequest {
    pub fn new(turn: TurnRequest, time: i64, pass: Option<String>, signer: &dyn Signer) -> Self {
        let sign = signer.sign(&SignPayload { t: time, m: &turn.latest });
        Self {
            messages: turn.messages,
            time,
            pass,
            sign,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Clone, Debug)]
pub struct GenerateClient {
    client: Client,
    endpoint: String,
}

impl GenerateClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), GENERATE_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the request and return the response body as a byte stream
    pub async fn open(
        &self,
        request: &GenerateRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<bytes::Bytes>>, ChatError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return match response.json::<ErrorBody>().await {
                Ok(body) => Err(ChatError::Upstream(body.error)),
                Err(e) => {
                    tracing::error!(%status, error = %e, "error response without a JSON body");
                    Err(ChatError::UnexpectedStatus(status))
                }
            };
        }

        Ok(response.bytes_stream())
    }

    /// Drive one turn to completion, reporting every step through `emit`.
    ///
    /// Always ends with exactly one `End` or `Failed` event unless the task
    /// running it is aborted first.
    pub async fn stream_turn<F>(&self, request: GenerateRequest, mut emit: F)
    where
        F: FnMut(StreamEvent),
    {
        let mut stream = match self.open(&request).await {
            Ok(stream) => Box::pin(stream),
            Err(e) => {
                emit(StreamEvent::Failed(e));
                return;
            }
        };

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => emit(StreamEvent::Chunk(bytes)),
                Err(e) => {
                    emit(StreamEvent::Failed(e.into()));
                    return;
                }
            }
        }

        emit(StreamEvent::End);
    }
}
