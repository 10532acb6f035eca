use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The model's primary output. Missing fields decode to empty values; only
/// an unparsable payload is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredSummary {
    pub title: String,
    pub summary: String,
    pub kids_summary: String,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryEntry {
    pub term: String,
    pub description: String,
}

/// Generative capability the pipeline is constructed with. `glossary` and
/// `illustrate` are best-effort enrichments; their failure never unwinds a
/// `summarize` result.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        allowed_tags: &[String],
        max_words: usize,
    ) -> Result<StructuredSummary, ProviderError>;

    async fn glossary(
        &self,
        summary_text: &str,
        max_entries: usize,
    ) -> Result<Vec<GlossaryEntry>, ProviderError>;

    async fn illustrate(&self, prompt_text: &str) -> Result<Option<Vec<u8>>, ProviderError>;
}

// ── Gemini client ──

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, text_model: String, image_model: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            text_model,
            image_model,
        })
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_ENDPOINT, model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        Ok(resp.json::<GenerateResponse>().await?)
    }
}

#[async_trait]
impl SummaryProvider for GeminiClient {
    async fn summarize(
        &self,
        text: &str,
        allowed_tags: &[String],
        max_words: usize,
    ) -> Result<StructuredSummary, ProviderError> {
        let prompt = summary_prompt(text, allowed_tags, max_words);
        let resp = self.generate(&self.text_model, &prompt).await?;
        let raw = response_text(&resp).ok_or(ProviderError::EmptyResponse)?;
        decode_summary(&raw)
    }

    async fn glossary(
        &self,
        summary_text: &str,
        max_entries: usize,
    ) -> Result<Vec<GlossaryEntry>, ProviderError> {
        if summary_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let prompt = glossary_prompt(summary_text, max_entries);
        let resp = self.generate(&self.text_model, &prompt).await?;
        let raw = response_text(&resp).unwrap_or_default();
        Ok(decode_glossary(&raw, max_entries))
    }

    async fn illustrate(&self, prompt_text: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let prompt = illustration_prompt(prompt_text);
        let resp = self.generate(&self.image_model, &prompt).await?;
        match first_inline_image(resp) {
            Some(bytes) => Ok(Some(bytes)),
            None => {
                debug!("image response carried no inline data");
                Ok(None)
            }
        }
    }
}

// ── Prompts ──

fn summary_prompt(text: &str, allowed_tags: &[String], max_words: usize) -> String {
    let tags = allowed_tags
        .iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Du bist ein Assistent, der offizielle Dokumente der Landeshauptstadt München \
         für Bürger:innen leicht verständlich zusammenfasst.\n\n\
         Erstelle eine Antwort ausschließlich als valides JSON mit folgendem Schema:\n\
         {{\n\
         \x20 \"title\": \"Kurzer präziser Titel\",\n\
         \x20 \"summary\": \"Maximal ca. {max_words} Wörter\",\n\
         \x20 \"kids_summary\": \"Sehr kurze, einfache Erklärung für Kinder\",\n\
         \x20 \"hashtags\": [\"#verkehr\", \"#wohnen\", ...]\n\
         }}\n\n\
         Regeln:\n\
         - title: ein Satz, informativ, so kurz wie möglich.\n\
         - summary: neutrale Zusammenfassung, max. ca. {max_words} Wörter.\n\
         - kids_summary: 2–4 Sätze, extrem einfach erklärt, ohne Fremdwörter.\n\
         - hashtags: Wähle 0-4 passende Tags aus dieser Liste: {tags}. \
         Gib sie als JSON-Array. Falls keiner passt, gib [].\n\
         - Antworte ohne zusätzliche Erklärung und ohne JEGLICHE Markdown-Codeblöcke, nur JSON.\n\n\
         Text:\n{text}"
    )
}

fn glossary_prompt(summary_text: &str, max_entries: usize) -> String {
    format!(
        "Identifiziere bis zu {max_entries} Begriffe oder Ausdrücke, die für Bürger:innen \
         schwer verständlich sein könnten. Gib zu jedem Begriff eine Erklärung in 1-2 kurzen \
         Sätzen ohne Fachjargon. Antworte ausschließlich als valides JSON-Array in der Form \
         [{{\"term\": \"Begriff\", \"description\": \"Erklärung\"}}]. \
         Wenn keine Begriffe nötig sind, gib [].\n\nText:\n{summary_text}"
    )
}

fn illustration_prompt(kids_summary: &str) -> String {
    format!(
        "{kids_summary}\n\n\
         Generate a cartoonish, family-friendly, colorful illustration \
         directly related to this text. \
         Do not include text in the image. \
         Resolution: 1536 x 1024 pixels."
    )
}

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

fn response_text(resp: &GenerateResponse) -> Option<String> {
    resp.candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| &c.parts)
        .find_map(|p| p.text.clone())
}

/// First part across all candidates carrying inline image data. Undecodable
/// base64 counts as "no image".
fn first_inline_image(resp: GenerateResponse) -> Option<Vec<u8>> {
    resp.candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .and_then(|inline| match BASE64.decode(inline.data.as_bytes()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("discarding undecodable inline image data: {e}");
                None
            }
        })
}

// ── Payload decoding ──

/// Remove one leading/trailing ``` fence if present. The model frequently
/// disobeys the "no fencing" instruction.
pub fn strip_code_fence(payload: &str) -> String {
    let text = payload.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    if lines.last().map(|l| l.trim().starts_with("```")) == Some(true) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// The single decoding step at the provider boundary: everything after this
/// is the canonical `StructuredSummary`, never a provider-specific shape.
pub fn decode_summary(raw: &str) -> Result<StructuredSummary, ProviderError> {
    let cleaned = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| ProviderError::MalformedPayload {
            detail: format!("{e}; payload: {cleaned}"),
        })?;
    let obj = value.as_object().ok_or_else(|| ProviderError::MalformedPayload {
        detail: format!("expected a JSON object, got: {cleaned}"),
    })?;

    let field = |name: &str| -> String {
        obj.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let hashtags = match obj.get("hashtags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };

    Ok(StructuredSummary {
        title: field("title"),
        summary: field("summary"),
        kids_summary: field("kids_summary"),
        hashtags,
    })
}

/// A glossary candidate is either a well-formed {term, description} pair or
/// it is discarded here; nothing downstream inspects entry shapes again.
pub fn decode_glossary(raw: &str, max_entries: usize) -> Vec<GlossaryEntry> {
    let cleaned = strip_code_fence(raw);
    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!("glossary payload not parseable, continuing without: {e}");
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let term = obj.get("term")?.as_str()?.trim();
            let description = obj.get("description")?.as_str()?.trim();
            if term.is_empty() || description.is_empty() {
                return None;
            }
            Some(GlossaryEntry {
                term: term.to_string(),
                description: description.to_string(),
            })
        })
        .take(max_entries)
        .collect()
}
