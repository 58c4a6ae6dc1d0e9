use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gp_contracts::models::{ModelSelector, CAPABILITY_IMAGE, CAPABILITY_TEXT, CAPABILITY_VISION};
use gp_contracts::providers::{NamedProvider, ProviderRegistry};
use gp_contracts::session::ImageBlob;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

mod controller;

pub use controller::{
    execute_turn, ConversationController, PendingTurn, SendOutcome, SendRejected, TurnReply,
    TurnRequest, IMAGINE_MISSING_PROMPT_REPLY, IMAGINE_PREFIX, TURN_FAILED_REPLY,
};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GENERATED_IMAGE_MIME: &str = "image/jpeg";

const DRYRUN_IMAGE_SIDE: u32 = 256;
const ERROR_BODY_MAX_CHARS: usize = 512;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// The three provider round trips a chat turn can need.
///
/// Every call is a single best-effort request: no retries, no timeout, no
/// caching. Any failure is returned to the caller as-is.
pub trait GenerationClient: Send + Sync {
    fn name(&self) -> &str;
    fn generate_text(&self, prompt: &str) -> Result<String>;
    fn generate_text_with_image(&self, prompt: &str, image: &ImageBlob) -> Result<String>;
    /// Returns a `data:image/jpeg;base64,...` URI for one square image.
    fn generate_image(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientModels {
    pub text: String,
    pub vision: String,
    pub image: String,
}

impl ClientModels {
    /// Resolves requested model names for `provider`, returning the chosen
    /// models and one note per fallback that had to be taken.
    pub fn resolve(
        provider: &str,
        text: Option<&str>,
        vision: Option<&str>,
        image: Option<&str>,
    ) -> Result<(Self, Vec<String>)> {
        let selector = ModelSelector::new(None);
        let mut notes = Vec::new();
        let mut pick = |requested: Option<&str>, capability: &str| -> Result<String> {
            let selection = selector
                .select(requested, capability, provider)
                .map_err(anyhow::Error::msg)?;
            if let Some(reason) = selection.fallback_reason {
                notes.push(reason);
            }
            Ok(selection.model.name)
        };
        let models = Self {
            text: pick(text, CAPABILITY_TEXT)?,
            vision: pick(vision, CAPABILITY_VISION)?,
            image: pick(image, CAPABILITY_IMAGE)?,
        };
        Ok((models, notes))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub models: ClientModels,
}

impl GeminiConfig {
    pub fn from_env(models: ClientModels) -> Result<Self> {
        let Some(api_key) = gemini_api_key() else {
            bail!("GEMINI_API_KEY, GOOGLE_API_KEY or API_KEY not set");
        };
        Ok(Self {
            api_key,
            api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            models,
        })
    }
}

fn gemini_api_key() -> Option<String> {
    non_empty_env("GEMINI_API_KEY")
        .or_else(|| non_empty_env("GOOGLE_API_KEY"))
        .or_else(|| non_empty_env("API_KEY"))
}

/// Gemini `generateContent` for text and multimodal prompts, Imagen
/// `predict` for image synthesis.
pub struct GeminiClient {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn models(&self) -> &ClientModels {
        &self.config.models
    }

    fn endpoint_for_model(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.config.api_base, model_path, method)
    }

    fn post_json(&self, provider: &str, endpoint: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("{provider} request failed ({endpoint})"))?;
        response_json_or_error(provider, response)
    }
}

impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_text(&self, prompt: &str) -> Result<String> {
        let endpoint = self.endpoint_for_model(&self.config.models.text, "generateContent");
        let response = self.post_json("Gemini", &endpoint, &text_request_payload(prompt))?;
        extract_response_text(&response)
    }

    fn generate_text_with_image(&self, prompt: &str, image: &ImageBlob) -> Result<String> {
        let endpoint = self.endpoint_for_model(&self.config.models.vision, "generateContent");
        let payload = multimodal_request_payload(prompt, image)?;
        let response = self.post_json("Gemini", &endpoint, &payload)?;
        extract_response_text(&response)
    }

    fn generate_image(&self, prompt: &str) -> Result<String> {
        let endpoint = self.endpoint_for_model(&self.config.models.image, "predict");
        let response = self.post_json("Imagen", &endpoint, &image_request_payload(prompt))?;
        let encoded = extract_first_image(&response)?;
        Ok(jpeg_data_uri(&encoded))
    }
}

pub fn text_request_payload(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
    })
}

/// Image part first, then the prompt. An empty prompt sends the image alone.
pub fn multimodal_request_payload(prompt: &str, image: &ImageBlob) -> Result<Value> {
    let mut parts = vec![inline_image_part(image)?];
    if !prompt.is_empty() {
        parts.push(json!({ "text": prompt }));
    }
    Ok(json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
    }))
}

pub fn inline_image_part(image: &ImageBlob) -> Result<Value> {
    if image.bytes.is_empty() {
        bail!("attached image has no data");
    }
    let media_type = image.media_type.trim();
    if !media_type.starts_with("image/") {
        bail!("unsupported attachment media type '{media_type}'");
    }
    Ok(json!({
        "inlineData": {
            "mimeType": media_type,
            "data": BASE64.encode(&image.bytes),
        }
    }))
}

pub fn image_request_payload(prompt: &str) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": "1:1",
            "outputOptions": { "mimeType": GENERATED_IMAGE_MIME },
        },
    })
}

/// Joins the text parts of the first candidate, skipping thought parts.
pub fn extract_response_text(response_payload: &Value) -> Result<String> {
    let candidate = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first());
    let Some(candidate) = candidate else {
        let block_reason = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str);
        match block_reason {
            Some(reason) => bail!("Gemini blocked the prompt ({reason})"),
            None => bail!("Gemini returned no candidates"),
        }
    };
    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.is_empty() {
        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        bail!("Gemini returned no text (finish reason: {finish_reason})");
    }
    Ok(text)
}

/// Base64 payload of the first generated image.
pub fn extract_first_image(response_payload: &Value) -> Result<String> {
    let predictions = response_payload
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for row in predictions {
        let Some(obj) = row.as_object() else {
            continue;
        };
        let encoded = obj
            .get("bytesBase64Encoded")
            .or_else(|| obj.get("bytes_base64_encoded"))
            .or_else(|| obj.get("image").and_then(|image| image.get("imageBytes")))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(encoded) = encoded {
            BASE64
                .decode(encoded.as_bytes())
                .context("Imagen image base64 decode failed")?;
            return Ok(encoded.to_string());
        }
    }
    bail!("Imagen returned no images");
}

pub fn jpeg_data_uri(encoded: &str) -> String {
    format!("data:{GENERATED_IMAGE_MIME};base64,{encoded}")
}

/// Splits a base64 `data:` URI into media type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let Some(rest) = uri.strip_prefix("data:") else {
        bail!("not a data URI");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URI has no payload");
    };
    let Some(media_type) = header.strip_suffix(";base64") else {
        bail!("data URI is not base64 encoded");
    };
    let bytes = BASE64
        .decode(payload.as_bytes())
        .context("data URI base64 decode failed")?;
    Ok((media_type.to_string(), bytes))
}

/// Offline client with deterministic replies.
#[derive(Debug, Clone, Default)]
pub struct DryrunClient;

impl GenerationClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_text(&self, prompt: &str) -> Result<String> {
        Ok(format!("[dryrun] You said: {prompt}"))
    }

    fn generate_text_with_image(&self, prompt: &str, image: &ImageBlob) -> Result<String> {
        inline_image_part(image)?;
        Ok(format!(
            "[dryrun] You said: {prompt} (with {}, {} bytes)",
            image.media_type,
            image.bytes.len()
        ))
    }

    fn generate_image(&self, prompt: &str) -> Result<String> {
        let bytes = dryrun_jpeg(prompt, DRYRUN_IMAGE_SIDE)?;
        Ok(jpeg_data_uri(&BASE64.encode(bytes)))
    }
}

fn dryrun_jpeg(prompt: &str, side: u32) -> Result<Vec<u8>> {
    let (r, g, b) = color_from_prompt(prompt);
    let mut image = RgbImage::new(side, side);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&image)
        .context("dryrun JPEG encode failed")?;
    Ok(bytes)
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

/// Short stable name for generated image bytes.
pub fn image_digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..4])
}

type ClientBuilder = fn(ClientModels) -> Result<Arc<dyn GenerationClient>>;

#[derive(Clone)]
pub struct ClientFactory {
    name: &'static str,
    build: ClientBuilder,
}

impl NamedProvider for ClientFactory {
    fn name(&self) -> &str {
        self.name
    }
}

impl ClientFactory {
    pub fn build(&self, models: ClientModels) -> Result<Arc<dyn GenerationClient>> {
        (self.build)(models)
    }
}

pub fn default_client_registry() -> ProviderRegistry<ClientFactory> {
    let mut registry = ProviderRegistry::default();
    registry.register(ClientFactory {
        name: "gemini",
        build: build_gemini_client,
    });
    registry.register(ClientFactory {
        name: "dryrun",
        build: build_dryrun_client,
    });
    registry
}

fn build_gemini_client(models: ClientModels) -> Result<Arc<dyn GenerationClient>> {
    let client = GeminiClient::new(GeminiConfig::from_env(models)?)?;
    Ok(Arc::new(client))
}

fn build_dryrun_client(_models: ClientModels) -> Result<Arc<dyn GenerationClient>> {
    Ok(Arc::new(DryrunClient))
}

pub fn build_client(provider: &str, models: ClientModels) -> Result<Arc<dyn GenerationClient>> {
    default_client_registry()
        .resolve(provider)?
        .build(models)
        .with_context(|| format!("failed to set up provider '{provider}'"))
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, ERROR_BODY_MAX_CHARS)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Flattens an error chain into one line for the event log.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use gp_contracts::session::ImageBlob;
    use mockito::Matcher;
    use serde_json::json;

    use super::BASE64;
    use super::{
        build_client, decode_data_uri, error_chain_text, extract_first_image,
        extract_response_text, image_digest_hex, image_request_payload, inline_image_part,
        multimodal_request_payload, text_request_payload, ClientModels, DryrunClient,
        GeminiClient, GeminiConfig, GenerationClient,
    };

    fn gemini_models() -> ClientModels {
        ClientModels::resolve("gemini", None, None, None).unwrap().0
    }

    fn client_for(server: &mockito::ServerGuard) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".to_string(),
            api_base: server.url(),
            models: gemini_models(),
        })
        .unwrap()
    }

    fn png_blob() -> ImageBlob {
        ImageBlob::new(vec![0x89, b'P', b'N', b'G'], "image/png")
    }

    #[test]
    fn default_models_follow_gemini_service() {
        let (models, notes) = ClientModels::resolve("gemini", None, None, None).unwrap();
        assert_eq!(models.text, "gemini-2.5-pro");
        assert_eq!(models.vision, "gemini-2.5-flash");
        assert_eq!(models.image, "imagen-4.0-generate-001");
        assert!(notes.is_empty());

        let (fallback, notes) =
            ClientModels::resolve("dryrun", Some("gemini-2.5-pro"), None, None).unwrap();
        assert_eq!(fallback.text, "dryrun-text-1");
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn text_payload_has_single_user_part() {
        let payload = text_request_payload("hello");
        assert_eq!(
            payload,
            json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn multimodal_payload_puts_image_before_text() -> anyhow::Result<()> {
        let blob = png_blob();
        let payload = multimodal_request_payload("what is this", &blob)?;
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            BASE64.decode(parts[0]["inlineData"]["data"].as_str().unwrap())?,
            blob.bytes
        );
        assert_eq!(parts[1]["text"], "what is this");

        let image_only = multimodal_request_payload("", &blob)?;
        assert_eq!(image_only["contents"][0]["parts"].as_array().unwrap().len(), 1);
        Ok(())
    }

    #[test]
    fn inline_part_rejects_empty_or_non_image_blobs() {
        assert!(inline_image_part(&ImageBlob::new(Vec::new(), "image/png")).is_err());
        assert!(inline_image_part(&ImageBlob::new(vec![1], "text/plain")).is_err());
    }

    #[test]
    fn image_payload_requests_one_square_jpeg() {
        let payload = image_request_payload("a cat");
        assert_eq!(payload["instances"][0]["prompt"], "a cat");
        assert_eq!(payload["parameters"]["sampleCount"], 1);
        assert_eq!(payload["parameters"]["aspectRatio"], "1:1");
        assert_eq!(
            payload["parameters"]["outputOptions"]["mimeType"],
            "image/jpeg"
        );
    }

    #[test]
    fn response_text_joins_parts_and_skips_thoughts() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Hello "},
                    {"text": "world"}
                ]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_response_text(&response)?, "Hello world");
        Ok(())
    }

    #[test]
    fn response_without_text_is_an_error() {
        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_response_text(&blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty = json!({"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]});
        let err = extract_response_text(&empty).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn first_image_is_extracted_in_either_shape() -> anyhow::Result<()> {
        let encoded = BASE64.encode([1u8, 2, 3]);
        let flat = json!({"predictions": [{"bytesBase64Encoded": encoded, "mimeType": "image/jpeg"}]});
        assert_eq!(extract_first_image(&flat)?, encoded);

        let nested = json!({"predictions": [{}, {"image": {"imageBytes": encoded}}]});
        assert_eq!(extract_first_image(&nested)?, encoded);

        let none = json!({"predictions": []});
        assert!(extract_first_image(&none).is_err());
        let garbage = json!({"predictions": [{"bytesBase64Encoded": "***"}]});
        assert!(extract_first_image(&garbage).is_err());
        Ok(())
    }

    #[test]
    fn data_uri_round_trips_through_decoder() -> anyhow::Result<()> {
        let (media_type, bytes) = decode_data_uri("data:image/jpeg;base64,AQID")?;
        assert_eq!(media_type, "image/jpeg");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(decode_data_uri("https://example.com/a.jpg").is_err());
        assert!(decode_data_uri("data:image/jpeg,AQID").is_err());
        Ok(())
    }

    #[test]
    fn gemini_text_request_hits_generate_content() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_query(Matcher::Missing)
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hi!"}]}}]}"#)
            .create();

        let reply = client_for(&server).generate_text("hello")?;
        assert_eq!(reply, "Hi!");
        mock.assert();
        Ok(())
    }

    #[test]
    fn gemini_multimodal_request_uses_vision_model() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"A cat."}]}}]}"#)
            .create();

        let reply = client_for(&server).generate_text_with_image("Describe", &png_blob())?;
        assert_eq!(reply, "A cat.");
        mock.assert();
        Ok(())
    }

    #[test]
    fn imagen_request_returns_jpeg_data_uri() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let encoded = BASE64.encode([0xFFu8, 0xD8, 0xFF]);
        let mock = server
            .mock("POST", "/models/imagen-4.0-generate-001:predict")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "instances": [{"prompt": "cat"}],
                "parameters": {"sampleCount": 1}
            })))
            .with_status(200)
            .with_body(json!({"predictions": [{"bytesBase64Encoded": encoded}]}).to_string())
            .create();

        let uri = client_for(&server).generate_image("cat")?;
        assert_eq!(uri, format!("data:image/jpeg;base64,{encoded}"));
        mock.assert();
        Ok(())
    }

    #[test]
    fn http_errors_surface_status_code() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota"}}"#)
            .create();

        let err = client_for(&server).generate_text("hello").unwrap_err();
        let text = error_chain_text(&err, 512);
        assert!(text.contains("429"), "unexpected error: {text}");
        assert!(text.contains("quota"), "unexpected error: {text}");
    }

    #[test]
    fn transport_errors_do_not_carry_the_key() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: "secret-key".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            models: gemini_models(),
        })
        .unwrap();

        let err = client.generate_text("hello").unwrap_err();
        let text = error_chain_text(&err, 2048);
        assert!(text.contains("Gemini request failed"), "unexpected error: {text}");
        assert!(!text.contains("secret-key"), "key leaked: {text}");
    }

    #[test]
    fn dryrun_image_is_a_deterministic_jpeg() -> anyhow::Result<()> {
        let client = DryrunClient;
        let first = client.generate_image("red barn")?;
        let second = client.generate_image("red barn")?;
        assert_eq!(first, second);
        let (media_type, bytes) = decode_data_uri(&first)?;
        assert_eq!(media_type, "image/jpeg");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(image_digest_hex(&bytes).len(), 8);
        assert_ne!(first, client.generate_image("blue barn")?);
        Ok(())
    }

    #[test]
    fn dryrun_text_replies_mention_the_prompt() -> anyhow::Result<()> {
        let client = DryrunClient;
        assert!(client.generate_text("hello")?.contains("hello"));
        let reply = client.generate_text_with_image("look", &png_blob())?;
        assert!(reply.contains("image/png"));
        Ok(())
    }

    #[test]
    fn unknown_provider_lists_registered_names() {
        let err = build_client("openai", gemini_models()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "unknown provider 'openai' (available: dryrun, gemini)"
        );
        let dryrun = build_client("dryrun", gemini_models()).unwrap();
        assert_eq!(dryrun.name(), "dryrun");
    }
}
