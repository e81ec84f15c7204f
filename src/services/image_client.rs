use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use reqwest::{header::AUTHORIZATION, Client};
use std::time::Duration;
use tracing::debug;

use crate::{
    config::ImageConfig,
    errors::{AppError, Result},
    models::{CreatePredictionRequest, PredictionInput, PredictionJob, PredictionResponse},
    services::{
        poller::JobPoller,
        upstream::{bearer_header, check_status},
    },
};

const SERVICE: &str = "image-prediction";

/// Client for a submit/poll image-prediction API (Replicate style).
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    config: ImageConfig,
    poller: JobPoller,
}

impl ImageClient {
    pub fn new(config: ImageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let poller = JobPoller::new(config.poll_interval(), config.poll_max_attempts);

        Ok(Self {
            client,
            config,
            poller,
        })
    }

    fn predictions_url(&self) -> String {
        format!("{}/predictions", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn submit(&self, request: &CreatePredictionRequest) -> Result<PredictionJob> {
        let authorization = bearer_header(SERVICE, self.config.api_token.as_deref())?;

        let response = self
            .client
            .post(self.predictions_url())
            .header(AUTHORIZATION, authorization)
            .json(request)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        parse_prediction(response).await
    }

    pub async fn get_prediction(&self, id: String) -> Result<PredictionJob> {
        let authorization = bearer_header(SERVICE, self.config.api_token.as_deref())?;
        let url = format!("{}/{}", self.predictions_url(), id);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let mut job = parse_prediction(response).await?;
        if job.id.is_empty() {
            job.id = id;
        }
        Ok(job)
    }

    /// Submits a cover prediction and waits for its first output URL.
    pub async fn generate_cover(&self, prompt: &str, reference_image: Option<String>) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation("Please describe the cover".to_string()));
        }

        // Fail on missing credentials before anything is submitted.
        bearer_header(SERVICE, self.config.api_token.as_deref())?;

        let request = CreatePredictionRequest {
            version: self.config.model_version.clone(),
            input: PredictionInput {
                prompt: prompt.to_string(),
                image: reference_image,
            },
        };

        debug!("Requesting cover - has_reference={}", request.input.image.is_some());

        self.poller
            .poll_until_terminal(|| self.submit(&request), |id| self.get_prediction(id))
            .await
    }

    pub fn max_reference_image_bytes(&self) -> usize {
        self.config.max_reference_image_bytes
    }
}

async fn parse_prediction(response: reqwest::Response) -> Result<PredictionJob> {
    let body: PredictionResponse = response
        .json()
        .await
        .map_err(|e| AppError::MalformedResponse(format!("Prediction response: {}", e)))?;
    Ok(body.into())
}

/// Validates an optional reference photo sent as raw base64 or a `data:`
/// URI and returns it as a `data:` URI with a sniffed MIME type.
pub fn normalize_reference_image(input: &str, max_bytes: usize) -> Result<String> {
    let input = input.trim();
    let payload = match input.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AppError::Validation("Reference image is not valid base64".to_string()))?,
        None => input,
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| AppError::Validation("Reference image is not valid base64".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("Reference image is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "Reference image is too large (max {} bytes)",
            max_bytes
        )));
    }

    let mime = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => {
            return Err(AppError::Validation(
                "Reference image must be a PNG, JPEG, WebP or GIF".to_string(),
            ))
        }
    };

    Ok(format!("data:{};base64,{}", mime, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn config(base_url: String, token: Option<&str>) -> ImageConfig {
        ImageConfig {
            api_token: token.map(str::to_string),
            base_url,
            model_version: "v1".to_string(),
            timeout_seconds: 5,
            poll_interval_ms: 1,
            poll_max_attempts: 5,
            max_reference_image_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_generate_cover_polls_until_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predictions"))
            .and(header("Authorization", "Bearer r8_test"))
            .and(body_partial_json(json!({
                "version": "v1",
                "input": {"prompt": "a bunny"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pred-1",
                "status": "starting"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/predictions/pred-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pred-1",
                "status": "processing"
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/predictions/pred-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pred-1",
                "status": "succeeded",
                "output": ["https://cdn.example/cover.png"]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ImageClient::new(config(mock_server.uri(), Some("r8_test"))).unwrap();
        let url = client.generate_cover("a bunny", None).await.unwrap();

        assert_eq!(url, "https://cdn.example/cover.png");
    }

    #[tokio::test]
    async fn test_failed_prediction() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pred-2",
                "status": "starting"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pred-2",
                "status": "failed",
                "error": "out of memory"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ImageClient::new(config(mock_server.uri(), Some("r8_test"))).unwrap();
        let err = client.generate_cover("a bunny", None).await.unwrap_err();

        assert!(matches!(err, AppError::JobFailed(ref detail) if detail == "out of memory"));
    }

    #[tokio::test]
    async fn test_canceled_prediction_stops_polling() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pred-3",
                "status": "starting"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pred-3",
                "status": "canceled",
                "error": null
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ImageClient::new(config(mock_server.uri(), Some("r8_test"))).unwrap();
        let err = client.generate_cover("a bunny", None).await.unwrap_err();

        assert!(matches!(err, AppError::JobFailed(ref detail) if detail == "unknown error"));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let client = ImageClient::new(config("http://127.0.0.1:9".to_string(), None)).unwrap();
        let err = client.generate_cover("a bunny", None).await.unwrap_err();

        assert!(matches!(err, AppError::AuthConfiguration(_)));
    }

    #[test]
    fn test_reference_image_data_uri() {
        let encoded = STANDARD.encode(PNG_MAGIC);

        let uri = normalize_reference_image(&encoded, 1024).unwrap();
        assert_eq!(uri, format!("data:image/png;base64,{}", encoded));

        let from_uri =
            normalize_reference_image(&format!("data:image/jpeg;base64,{}", encoded), 1024).unwrap();
        assert!(from_uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_reference_image_rejections() {
        assert!(matches!(
            normalize_reference_image("%%%not-base64", 1024),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_reference_image(&STANDARD.encode(b"plain text, not an image"), 1024),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_reference_image(&STANDARD.encode(PNG_MAGIC), 4),
            Err(AppError::Validation(_))
        ));
    }
}
