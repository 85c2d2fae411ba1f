//! Intent resolution with confidence-gated clarification.
//!
//! Two [`IntentClassifier`] implementations share one interface:
//!
//! * [`LlmIntentClassifier`] asks the inference service for a JSON
//!   [`IntentAssignment`] and parses it strictly;
//! * [`HeuristicClassifier`] maps keywords in the instruction to a task and
//!   never touches the network.
//!
//! [`IntentResolver::resolve`] is the single place that chooses between them:
//! the service-backed classifier when one is configured, the heuristic when it
//! is not or when the service call / parse fails. The service is called at most
//! once per resolution.
//!
//! Whatever path produced it, the assignment then passes the clarification
//! gate: an `unclear` or low-confidence assignment always carries a question,
//! a confident one never does.

use crate::config::IntakeConfig;
use crate::output::{Intent, IntentAssignment};
use crate::pipeline::normalize::strip_code_fences;
use crate::prompts::{intent_prompt, DEFAULT_CLARIFYING_QUESTION, DEFAULT_SYSTEM_PROMPT, TRUNCATION_MARKER};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Confidence used when the service omits it or sends something unparseable.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Confidence of a keyword match in the heuristic classifier.
const HEURISTIC_MATCH_CONFIDENCE: f64 = 0.9;

/// Confidence of the heuristic classifier when nothing matched.
const HEURISTIC_UNCLEAR_CONFIDENCE: f64 = 0.4;

/// The service-backed classifier could not produce an assignment.
#[derive(Debug, Clone, Error)]
pub enum IntentError {
    #[error("inference service call failed: {0}")]
    Service(String),

    #[error("inference reply is not a valid intent object: {detail}")]
    MalformedResponse { detail: String, raw: String },
}

/// Classifies an instruction (with the extracted text as context).
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// `context` is already truncated to the configured limit.
    async fn classify(&self, context: &str, instruction: &str)
        -> Result<IntentAssignment, IntentError>;
}

// ── Resolver ─────────────────────────────────────────────────────────────

/// Resolves intents, falling back to keyword heuristics when the inference
/// service is unavailable.
#[derive(Clone)]
pub struct IntentResolver {
    primary: Option<Arc<dyn IntentClassifier>>,
    fallback: HeuristicClassifier,
    context_char_limit: usize,
    clarify_threshold: f64,
}

impl IntentResolver {
    /// Resolver using `primary` when present, heuristics otherwise.
    pub fn new(primary: Option<Arc<dyn IntentClassifier>>) -> Self {
        let defaults = IntakeConfig::default();
        Self {
            primary,
            fallback: HeuristicClassifier,
            context_char_limit: defaults.context_char_limit,
            clarify_threshold: defaults.clarify_threshold,
        }
    }

    /// Heuristic-only resolver.
    pub fn heuristic() -> Self {
        Self::new(None)
    }

    /// Clamped so a cut context always has room for the truncation marker.
    pub fn with_context_char_limit(mut self, limit: usize) -> Self {
        self.context_char_limit = limit.max(TRUNCATION_MARKER.chars().count() + 1);
        self
    }

    pub fn with_clarify_threshold(mut self, threshold: f64) -> Self {
        self.clarify_threshold = threshold;
        self
    }

    /// Whether a service-backed classifier is configured.
    pub fn has_service(&self) -> bool {
        self.primary.is_some()
    }

    /// Resolve `instruction` against `extracted_text`. Never fails.
    pub async fn resolve(&self, extracted_text: &str, instruction: &str) -> IntentAssignment {
        let context = truncate_context(extracted_text, self.context_char_limit);
        if let Cow::Owned(_) = context {
            debug!(
                "Context truncated to {} chars for intent classification",
                self.context_char_limit
            );
        }

        let assignment = match &self.primary {
            Some(classifier) => match classifier.classify(&context, instruction).await {
                Ok(assignment) => assignment,
                Err(e) => {
                    warn!(
                        "Intent classifier '{}' failed, using keyword heuristics: {}",
                        classifier.name(),
                        e
                    );
                    self.fallback.assign(instruction)
                }
            },
            None => self.fallback.assign(instruction),
        };

        let assignment = apply_clarification_gate(assignment, self.clarify_threshold);
        info!(
            "Resolved intent: {} ({:.2}){}",
            assignment.intent,
            assignment.confidence,
            if assignment.needs_clarification() {
                "; clarification needed"
            } else {
                ""
            }
        );
        assignment
    }
}

/// Cut `text` to at most `limit` characters, ending with
/// [`TRUNCATION_MARKER`] when anything was removed. A limit too small to hold
/// the marker yields a bare prefix.
pub fn truncate_context(text: &str, limit: usize) -> Cow<'_, str> {
    if text.chars().count() <= limit {
        return Cow::Borrowed(text);
    }
    let marker = TRUNCATION_MARKER.chars().count();
    if limit < marker {
        return Cow::Owned(text.chars().take(limit).collect());
    }
    let end = text
        .char_indices()
        .nth(limit - marker)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    Cow::Owned(format!("{}{}", &text[..end], TRUNCATION_MARKER))
}

/// Enforce "ask when uncertain, proceed when confident".
pub fn apply_clarification_gate(mut assignment: IntentAssignment, threshold: f64) -> IntentAssignment {
    let uncertain = assignment.intent == Intent::Unclear || assignment.confidence < threshold;
    if uncertain {
        if assignment.clarifying_question.is_none() {
            assignment.clarifying_question = Some(DEFAULT_CLARIFYING_QUESTION.to_string());
        }
    } else {
        assignment.clarifying_question = None;
    }
    assignment
}

// ── Heuristic classifier ─────────────────────────────────────────────────

/// Deterministic keyword matcher used when no inference service is usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Case-insensitive substring rules, first match wins.
    pub fn assign(&self, instruction: &str) -> IntentAssignment {
        let instr = instruction.to_lowercase();
        if instr.contains("summar") {
            return IntentAssignment::new(Intent::Summarize, HEURISTIC_MATCH_CONFIDENCE);
        }
        if instr.contains("sentiment") {
            return IntentAssignment::new(Intent::Sentiment, HEURISTIC_MATCH_CONFIDENCE);
        }
        if instr.contains("explain") && instr.contains("code") {
            return IntentAssignment::new(Intent::CodeExplain, HEURISTIC_MATCH_CONFIDENCE);
        }
        IntentAssignment::new(Intent::Unclear, HEURISTIC_UNCLEAR_CONFIDENCE)
            .with_question(DEFAULT_CLARIFYING_QUESTION)
    }
}

#[async_trait]
impl IntentClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, _context: &str, instruction: &str)
        -> Result<IntentAssignment, IntentError> {
        Ok(self.assign(instruction))
    }
}

// ── LLM classifier ───────────────────────────────────────────────────────

/// Classifier backed by an inference provider returning JSON.
pub struct LlmIntentClassifier {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmIntentClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let defaults = IntakeConfig::default();
        Self {
            provider,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Classifier using the prompt and sampling settings from `config`.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &IntakeConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// The two-message request sent to the provider.
    pub fn build_messages(&self, context: &str, instruction: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(intent_prompt(context, instruction)),
        ]
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(&self, context: &str, instruction: &str)
        -> Result<IntentAssignment, IntentError> {
        let messages = self.build_messages(context, instruction);
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| IntentError::Service(e.to_string()))?;
        debug!(
            "Intent classification: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        parse_assignment(&response.content)
    }
}

#[derive(Deserialize)]
struct RawAssignment {
    intent: Intent,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    clarifying_question: Option<String>,
    #[serde(default)]
    required_constraints: Option<Map<String, Value>>,
}

/// Parse a service reply into an assignment.
///
/// The reply must be one JSON object (an outer code fence is tolerated) with a
/// known `intent`. Optional fields default to null; a missing or unparseable
/// `confidence` becomes [`DEFAULT_CONFIDENCE`]; confidence is clamped to 0–1.
pub fn parse_assignment(reply: &str) -> Result<IntentAssignment, IntentError> {
    let body = strip_code_fences(reply);
    let raw: RawAssignment =
        serde_json::from_str(&body).map_err(|e| IntentError::MalformedResponse {
            detail: e.to_string(),
            raw: reply.to_string(),
        })?;

    let clarifying_question = raw
        .clarifying_question
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    Ok(IntentAssignment {
        intent: raw.intent,
        confidence: normalize_confidence(raw.confidence.as_ref()),
        clarifying_question,
        required_constraints: raw.required_constraints,
    })
}

fn normalize_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError, MockProvider, Result as LlmResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn heuristic_rules() {
        let h = HeuristicClassifier;
        assert_eq!(h.assign("Please SUMMARIZE this").intent, Intent::Summarize);
        assert_eq!(h.assign("summary please").intent, Intent::Summarize);
        assert_eq!(h.assign("what's the sentiment?").intent, Intent::Sentiment);
        assert_eq!(h.assign("explain this code").intent, Intent::CodeExplain);
        assert_eq!(h.assign("explain this").intent, Intent::Unclear);
        assert_eq!(h.assign("code").intent, Intent::Unclear);
    }

    #[test]
    fn heuristic_prefers_summary_over_sentiment() {
        let a = HeuristicClassifier.assign("summarize the sentiment");
        assert_eq!(a.intent, Intent::Summarize);
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn heuristic_unclear_carries_fixed_question() {
        let a = HeuristicClassifier.assign("");
        assert_eq!(a.intent, Intent::Unclear);
        assert_eq!(a.confidence, 0.4);
        assert_eq!(a.clarifying_question.as_deref(), Some(DEFAULT_CLARIFYING_QUESTION));
    }

    #[test]
    fn parse_full_reply() {
        let a = parse_assignment(
            r#"{"intent":"action_items","confidence":0.82,"clarifying_question":null,"required_constraints":{"format":"bullets"}}"#,
        )
        .unwrap();
        assert_eq!(a.intent, Intent::ActionItems);
        assert_eq!(a.confidence, 0.82);
        assert_eq!(a.clarifying_question, None);
        assert_eq!(a.required_constraints.unwrap()["format"], "bullets");
    }

    #[test]
    fn parse_missing_optionals_defaults_to_null() {
        let a = parse_assignment(r#"{"intent":"summarize","confidence":0.95}"#).unwrap();
        assert_eq!(a.clarifying_question, None);
        assert_eq!(a.required_constraints, None);
    }

    #[test]
    fn parse_confidence_defaults_and_coercion() {
        assert_eq!(parse_assignment(r#"{"intent":"sentiment"}"#).unwrap().confidence, 0.5);
        assert_eq!(
            parse_assignment(r#"{"intent":"sentiment","confidence":"high"}"#).unwrap().confidence,
            0.5
        );
        assert_eq!(
            parse_assignment(r#"{"intent":"sentiment","confidence":"0.8"}"#).unwrap().confidence,
            0.8
        );
        assert_eq!(
            parse_assignment(r#"{"intent":"sentiment","confidence":7}"#).unwrap().confidence,
            1.0
        );
    }

    #[test]
    fn parse_fenced_reply() {
        let a = parse_assignment("```json\n{\"intent\":\"fetch_yt\",\"confidence\":0.9}\n```").unwrap();
        assert_eq!(a.intent, Intent::FetchYt);
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(parse_assignment("Sure! The intent is summarize.").is_err());
        assert!(parse_assignment(r#"{"intent":"translate","confidence":0.9}"#).is_err());
        assert!(parse_assignment(r#"{"confidence":0.9}"#).is_err());
        assert!(parse_assignment(r#"{"intent":"summarize","required_constraints":"short"}"#).is_err());
        assert!(parse_assignment(r#"[{"intent":"summarize"}]"#).is_err());
    }

    #[test]
    fn blank_question_treated_as_absent() {
        let a = parse_assignment(r#"{"intent":"unclear","confidence":0.3,"clarifying_question":"  "}"#)
            .unwrap();
        assert_eq!(a.clarifying_question, None);
    }

    #[test]
    fn gate_adds_question_when_uncertain() {
        let low = apply_clarification_gate(IntentAssignment::new(Intent::Summarize, 0.6), 0.75);
        assert_eq!(low.intent, Intent::Summarize);
        assert_eq!(low.clarifying_question.as_deref(), Some(DEFAULT_CLARIFYING_QUESTION));

        let unclear = apply_clarification_gate(
            IntentAssignment::new(Intent::Unclear, 0.9).with_question("Short or long summary?"),
            0.75,
        );
        assert_eq!(unclear.clarifying_question.as_deref(), Some("Short or long summary?"));
    }

    #[test]
    fn gate_drops_question_when_confident() {
        let a = apply_clarification_gate(
            IntentAssignment::new(Intent::Sentiment, 0.8).with_question("Are you sure?"),
            0.75,
        );
        assert_eq!(a.clarifying_question, None);
    }

    #[test]
    fn truncation_bounds_and_marks() {
        let text = "a".repeat(8001);
        let cut = truncate_context(&text, 8000);
        assert!(cut.chars().count() < text.chars().count());
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), 8000);
    }

    #[test]
    fn truncation_leaves_short_text_alone() {
        let text = "short";
        assert!(matches!(truncate_context(text, 8000), Cow::Borrowed("short")));
        let exact = "b".repeat(8000);
        assert_eq!(truncate_context(&exact, 8000).len(), 8000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(20);
        let cut = truncate_context(&text, 10);
        assert_eq!(cut, format!("{}{}", "é".repeat(7), TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_below_marker_length_still_shortens() {
        assert_eq!(truncate_context("ab", 1), "a");
        assert_eq!(truncate_context("ab", 0), "");
        assert_eq!(truncate_context("abcd", 3), TRUNCATION_MARKER);
    }

    #[tokio::test]
    async fn tiny_resolver_limit_is_clamped() {
        let provider = Arc::new(MockProvider::new());
        provider.add_response(r#"{"intent":"summarize","confidence":0.9}"#).await;
        let r = IntentResolver::new(Some(Arc::new(LlmIntentClassifier::new(provider))))
            .with_context_char_limit(1);
        assert_eq!(r.context_char_limit, TRUNCATION_MARKER.len() + 1);
        assert_eq!(r.resolve("abcdefgh", "summarize").await.intent, Intent::Summarize);
    }

    struct Failing;

    #[async_trait]
    impl IntentClassifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn classify(&self, _c: &str, _i: &str) -> Result<IntentAssignment, IntentError> {
            Err(IntentError::Service("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn resolver_falls_back_on_service_failure() {
        let r = IntentResolver::new(Some(Arc::new(Failing)));
        assert!(r.has_service());
        let a = r.resolve("text", "please summarize this").await;
        assert_eq!(a, IntentAssignment::new(Intent::Summarize, 0.9));
    }

    #[tokio::test]
    async fn heuristic_resolver_is_idempotent() {
        let r = IntentResolver::heuristic();
        let first = r.resolve("doc", "tell me about it").await;
        let second = r.resolve("doc", "tell me about it").await;
        assert_eq!(first, second);
        assert_eq!(first.intent, Intent::Unclear);
    }

    #[test]
    fn heuristic_classifier_through_the_trait() {
        let a = tokio_test::block_on(HeuristicClassifier.classify("ignored", "sentiment?")).unwrap();
        assert_eq!(a, IntentAssignment::new(Intent::Sentiment, 0.9));
        assert_eq!(HeuristicClassifier.name(), "heuristic");
    }

    // ── LLM classifier against edgequake-llm providers ──────────────────

    /// Provider whose every call fails, counting the attempts.
    #[derive(Default)]
    struct RefusingProvider {
        calls: AtomicUsize,
    }

    impl RefusingProvider {
        fn refuse(&self) -> LlmResult<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::NetworkError("connection refused".into()))
        }
    }

    #[async_trait]
    impl LLMProvider for RefusingProvider {
        fn name(&self) -> &str {
            "refusing"
        }

        fn model(&self) -> &str {
            "none"
        }

        fn max_context_length(&self) -> usize {
            4096
        }

        async fn complete(&self, _prompt: &str) -> LlmResult<LLMResponse> {
            self.refuse()
        }

        async fn complete_with_options(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> LlmResult<LLMResponse> {
            self.refuse()
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> LlmResult<LLMResponse> {
            self.refuse()
        }
    }

    #[test]
    fn request_is_system_then_user_with_context() {
        let c = LlmIntentClassifier::new(Arc::new(MockProvider::new()));
        let messages = c.build_messages("Quarterly revenue grew 12%.", "summarize it");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains(r#""extracted_text": "Quarterly revenue grew 12%.""#));
        assert!(messages[1].content.contains(r#""user_instruction": "summarize it""#));
        assert!(messages[1].content.contains("clarifying_question"));
    }

    #[test]
    fn request_options_are_deterministic_and_bounded() {
        let options = LlmIntentClassifier::new(Arc::new(MockProvider::new())).build_options();
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.max_tokens, Some(400));
    }

    #[test]
    fn configured_system_prompt_replaces_default() {
        let config = IntakeConfig {
            system_prompt: Some("Answer in JSON.".into()),
            ..IntakeConfig::default()
        };
        let c = LlmIntentClassifier::from_config(Arc::new(MockProvider::new()), &config);
        assert_eq!(c.build_messages("", "")[0].content, "Answer in JSON.");
    }

    #[tokio::test]
    async fn provider_reply_is_parsed() {
        let provider = Arc::new(MockProvider::new());
        provider
            .add_response("```json\n{\"intent\":\"code_explain\",\"confidence\":0.88}\n```")
            .await;
        let a = LlmIntentClassifier::new(provider)
            .classify("fn main() {}", "walk me through this")
            .await
            .unwrap();
        assert_eq!(a, IntentAssignment::new(Intent::CodeExplain, 0.88));
    }

    #[tokio::test]
    async fn provider_prose_reply_falls_back_to_heuristics() {
        // An empty mock queue answers with plain prose.
        let c = LlmIntentClassifier::new(Arc::new(MockProvider::new()));
        assert!(matches!(
            c.classify("doc", "summarize").await,
            Err(IntentError::MalformedResponse { .. })
        ));

        let r = IntentResolver::new(Some(Arc::new(c)));
        let a = r.resolve("doc", "summarize").await;
        assert_eq!(a, IntentAssignment::new(Intent::Summarize, 0.9));
    }

    #[tokio::test]
    async fn provider_failure_falls_back_after_one_call() {
        let provider = Arc::new(RefusingProvider::default());
        let c = LlmIntentClassifier::new(provider.clone());
        assert!(matches!(
            c.classify("doc", "x").await,
            Err(IntentError::Service(msg)) if msg.contains("connection refused")
        ));
        provider.calls.store(0, Ordering::SeqCst);

        let r = IntentResolver::new(Some(Arc::new(c)));
        let a = r.resolve("doc", "").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.intent, Intent::Unclear);
        assert_eq!(a.confidence, 0.4);
        assert_eq!(a.clarifying_question.as_deref(), Some(DEFAULT_CLARIFYING_QUESTION));
    }

    #[test]
    fn required_constraints_round_trip_as_object() {
        let a = parse_assignment(
            &json!({"intent": "summarize", "confidence": 0.9, "required_constraints": {"summary_length": "short"}})
                .to_string(),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap()["required_constraints"],
            json!({"summary_length": "short"})
        );
    }
}
