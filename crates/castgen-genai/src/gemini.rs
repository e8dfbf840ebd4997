//! Gemini client for content generation.
//!
//! Each generation kind carries its own instruction profile and output
//! shape; the client builds the stage-specific prompt, attaches the audio
//! reference, and parses the response into the typed output.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use castgen_models::Chapter;

use crate::adapter::{GenerationAdapter, GenerationKind, GenerationOutput, GenerationRequest};
use crate::error::{AdapterError, AdapterResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChapterEntry {
    timestamp: String,
    label: String,
}

#[derive(Debug, Deserialize)]
struct TitleKeywordsEntry {
    title: String,
    #[serde(default)]
    keywords: Vec<String>,
}

impl GeminiClient {
    /// Create a new client with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Create a client from environment variables.
    pub fn from_env() -> AdapterResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AdapterError::Config("GEMINI_API_KEY not set".to_string()))?;
        let mut client = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            client.model = model;
        }
        Ok(client)
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Instruction profile for a generation kind.
    fn instruction(&self, request: &GenerationRequest) -> String {
        let base = match request.kind {
            GenerationKind::Transcript => {
                "Transcribe the attached audio verbatim. Return ONLY the plain transcript text, \
                 no timestamps, no speaker labels, no commentary."
            }
            GenerationKind::Subtitles => {
                "Produce WebVTT subtitles for the attached audio. Return ONLY a valid WebVTT \
                 document starting with the WEBVTT header, with cue timings in \
                 HH:MM:SS.mmm --> HH:MM:SS.mmm form."
            }
            GenerationKind::ShowNotes => {
                "Write episode show notes for the attached audio: a short summary paragraph \
                 followed by bullet points of the key topics. Return ONLY the prose."
            }
            GenerationKind::Chapters => {
                "Identify chapter boundaries in the attached audio. Return ONLY a JSON array of \
                 objects {\"timestamp\": \"HH:MM:SS\", \"label\": \"...\"}, ordered by timestamp, \
                 starting at 00:00:00."
            }
            GenerationKind::TitleKeywords => {
                "Suggest one compelling episode title and a keyword list for the attached audio. \
                 Return ONLY a JSON object {\"title\": \"...\", \"keywords\": [\"...\"]}."
            }
        };

        match &request.transcript {
            Some(transcript) => format!(
                "{base}\n\nUse this transcript of the audio as the authoritative text:\n\nTRANSCRIPT:\n{transcript}"
            ),
            None => base.to_string(),
        }
    }

    /// Call the Gemini API and return the raw text of the first candidate.
    async fn call_api(&self, request: &GenerationRequest) -> AdapterResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mime_type = match request.kind {
            _ if request.audio_url.ends_with(".wav") => "audio/wav",
            _ => "audio/mpeg",
        };

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: self.instruction(request),
                    },
                    Part::FileData {
                        file_data: FileData {
                            mime_type: mime_type.to_string(),
                            file_uri: request.audio_url.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: match request.kind {
                    GenerationKind::Chapters | GenerationKind::TitleKeywords => {
                        "application/json".to_string()
                    }
                    _ => "text/plain".to_string(),
                },
            },
        };

        debug!(kind = %request.kind, model = %self.model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AdapterError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AdapterError::Http(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::invalid(format!("unparseable response body: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or(AdapterError::NoResponse)?;

        let text = strip_markdown_fences(&text).trim().to_string();
        if text.is_empty() {
            return Err(AdapterError::invalid("empty response text"));
        }

        Ok(text)
    }

    /// Parse raw response text into the kind's output shape.
    fn parse_output(kind: GenerationKind, text: &str) -> AdapterResult<GenerationOutput> {
        match kind {
            GenerationKind::Transcript => Ok(GenerationOutput::Transcript(text.to_string())),
            GenerationKind::Subtitles => {
                if !text.starts_with("WEBVTT") {
                    return Err(AdapterError::invalid("subtitle output is not WebVTT"));
                }
                Ok(GenerationOutput::Subtitles {
                    format: "vtt".to_string(),
                    body: text.to_string(),
                })
            }
            GenerationKind::ShowNotes => Ok(GenerationOutput::ShowNotes(text.to_string())),
            GenerationKind::Chapters => {
                let entries: Vec<ChapterEntry> = serde_json::from_str(text)
                    .map_err(|e| AdapterError::invalid(format!("chapter JSON: {}", e)))?;
                let mut chapters = Vec::with_capacity(entries.len());
                for entry in entries {
                    chapters.push(Chapter {
                        timestamp_secs: parse_timestamp(&entry.timestamp)?,
                        label: entry.label,
                    });
                }
                if chapters.is_empty() {
                    return Err(AdapterError::invalid("no chapters returned"));
                }
                Ok(GenerationOutput::Chapters(chapters))
            }
            GenerationKind::TitleKeywords => {
                let entry: TitleKeywordsEntry = serde_json::from_str(text)
                    .map_err(|e| AdapterError::invalid(format!("title JSON: {}", e)))?;
                if entry.title.trim().is_empty() {
                    return Err(AdapterError::invalid("empty title"));
                }
                Ok(GenerationOutput::TitleKeywords {
                    title: entry.title,
                    keywords: entry.keywords,
                })
            }
        }
    }
}

#[async_trait]
impl GenerationAdapter for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> AdapterResult<GenerationOutput> {
        let text = self.call_api(request).await?;
        let output = Self::parse_output(request.kind, &text)?;
        info!(kind = %request.kind, "Generation succeeded");
        Ok(output)
    }
}

/// Strip markdown code fences Gemini sometimes wraps JSON in.
fn strip_markdown_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text)
}

/// Parse "HH:MM:SS" or "HH:MM:SS.mmm" into seconds.
fn parse_timestamp(s: &str) -> AdapterResult<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(AdapterError::invalid(format!("bad timestamp '{}'", s)));
    }
    let hours: f64 = parts[0]
        .parse()
        .map_err(|_| AdapterError::invalid(format!("bad timestamp '{}'", s)))?;
    let minutes: f64 = parts[1]
        .parse()
        .map_err(|_| AdapterError::invalid(format!("bad timestamp '{}'", s)))?;
    let seconds: f64 = parts[2]
        .parse()
        .map_err(|_| AdapterError::invalid(format!("bad timestamp '{}'", s)))?;
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": text}]}}
            ]
        })
    }

    #[test]
    fn test_strip_markdown_fences() {
        assert_eq!(strip_markdown_fences("```json\n{\"a\":1}\n```"), "\n{\"a\":1}\n");
        assert_eq!(strip_markdown_fences("plain"), "plain");
    }

    #[test]
    fn test_parse_timestamp() {
        assert!((parse_timestamp("00:01:30").unwrap() - 90.0).abs() < 1e-9);
        assert!((parse_timestamp("01:00:00.500").unwrap() - 3600.5).abs() < 1e-9);
        assert!(parse_timestamp("90").is_err());
    }

    #[test]
    fn test_parse_output_shapes() {
        let out = GeminiClient::parse_output(GenerationKind::Transcript, "hello").unwrap();
        assert_eq!(out, GenerationOutput::Transcript("hello".to_string()));

        let out = GeminiClient::parse_output(
            GenerationKind::Chapters,
            r#"[{"timestamp":"00:00:00","label":"Intro"},{"timestamp":"00:05:00","label":"Main"}]"#,
        )
        .unwrap();
        match out {
            GenerationOutput::Chapters(chapters) => {
                assert_eq!(chapters.len(), 2);
                assert_eq!(chapters[1].timestamp_secs, 300.0);
            }
            _ => panic!("expected chapters"),
        }

        let err =
            GeminiClient::parse_output(GenerationKind::Subtitles, "not a vtt file").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_generate_title_keywords() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"title":"Rust in Production","keywords":["rust","backend"]}"#,
            )))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key").with_base_url(server.uri());
        let request = GenerationRequest::new(GenerationKind::TitleKeywords, "memory://a.wav");
        let output = client.generate(&request).await.unwrap();

        match output {
            GenerationOutput::TitleKeywords { title, keywords } => {
                assert_eq!(title, "Rust in Production");
                assert_eq!(keywords, vec!["rust", "backend"]);
            }
            _ => panic!("expected title/keywords"),
        }
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key").with_base_url(server.uri());
        let request = GenerationRequest::new(GenerationKind::Transcript, "memory://a.wav");
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidResponse(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key").with_base_url(server.uri());
        let request = GenerationRequest::new(GenerationKind::Transcript, "memory://a.wav");
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, AdapterError::RateLimited));
    }
}
