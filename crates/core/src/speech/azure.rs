use quick_xml::escape::escape;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tracing::debug;

use crate::{
    config::SpeechSettings,
    error::Result,
    speech::{
        CancellationDetails, CancellationErrorCode, SpeechClient, SynthesisOutcome,
        SynthesisResult,
    },
};

const USER_AGENT: &str = "narrator";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";
const REQUEST_ID_HEADER: &str = "X-RequestId";

/// Azure Cognitive Services text-to-speech over its REST endpoint.
pub struct AzureSpeechClient {
    http: reqwest::Client,
    settings: SpeechSettings,
    endpoint: String,
}

impl AzureSpeechClient {
    pub fn new(settings: SpeechSettings) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let endpoint = settings.endpoint();
        Ok(Self {
            http,
            settings,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpeechClient for AzureSpeechClient {
    fn voice(&self) -> &str {
        &self.settings.voice
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesisResult> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(SUBSCRIPTION_KEY_HEADER, &self.settings.subscription_key)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(OUTPUT_FORMAT_HEADER, &self.settings.output_format)
            .body(build_ssml(&self.settings.voice, text))
            .send()
            .await?;

        let result_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let status = response.status();
        debug!("Speech service answered {} for request {}", status, result_id);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            };
            return Ok(SynthesisResult {
                result_id,
                outcome: SynthesisOutcome::Cancelled(CancellationDetails::error(
                    classify_status(status),
                    details,
                )),
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Ok(SynthesisResult {
                result_id,
                outcome: SynthesisOutcome::Cancelled(CancellationDetails::error(
                    CancellationErrorCode::RuntimeError,
                    "Speech service returned no audio",
                )),
            });
        }

        Ok(SynthesisResult {
            result_id,
            outcome: SynthesisOutcome::Completed {
                audio: audio.to_vec(),
            },
        })
    }
}

/// Map an error status from the speech service to a cancellation code.
pub fn classify_status(status: StatusCode) -> CancellationErrorCode {
    match status {
        StatusCode::BAD_REQUEST => CancellationErrorCode::BadRequest,
        StatusCode::UNAUTHORIZED => CancellationErrorCode::AuthenticationFailure,
        StatusCode::FORBIDDEN => CancellationErrorCode::Forbidden,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            CancellationErrorCode::ServiceTimeout
        }
        StatusCode::TOO_MANY_REQUESTS => CancellationErrorCode::TooManyRequests,
        StatusCode::SERVICE_UNAVAILABLE => CancellationErrorCode::ServiceUnavailable,
        s if s.is_server_error() => CancellationErrorCode::ServiceError,
        _ => CancellationErrorCode::RuntimeError,
    }
}

/// SSML request body speaking `text` with `voice`.
pub fn build_ssml(voice: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'>\
         <voice name='{voice}'>{text}</voice></speak>",
        lang = voice_locale(voice),
        voice = escape(voice),
        text = escape(text),
    )
}

/// Locale prefix of a voice name, e.g. `bn-IN` for `bn-IN-TanishaaNeural`.
fn voice_locale(voice: &str) -> String {
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region))
            if !lang.is_empty()
                && !region.is_empty()
                && lang.chars().all(|c| c.is_ascii_alphabetic())
                && region.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{}-{}", lang, region)
        }
        _ => "en-US".to_string(),
    }
}
