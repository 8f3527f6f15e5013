//! Analysis service. Orchestrates the chunked multi-provider chat analysis workflow.
//!
//! Coordinates between the export normalizer (data), the provider gateway (analysis) and the
//! aggregator (results).

use crate::adapters::ai::{ProviderCredentials, build_providers, parse_analysis};
use crate::adapters::export::ExportFile;
use crate::domain::{
    AnalysisReport, AnalysisResult, ChunkPolicy, DomainError, FileReport, Message, ParsedChatData,
    aggregate, chunk_messages,
};
use crate::ports::AnalysisProvider;
use crate::usecases::gateway::{ProviderGateway, ProviderReply};
use crate::usecases::prompt::PromptBuilder;
use crate::usecases::rate_limiter::RateLimit;
use crate::usecases::retry::RetryPolicy;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Progress callback: `(percent 0..=100, status)`. Percent never decreases within one run.
pub type ProgressFn<'a> = dyn Fn(u8, &str) + Send + Sync + 'a;

/// How each chunk prompt is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One provider per chunk, rotating.
    #[default]
    RoundRobin,
    /// Every provider per chunk; valid candidates are aggregated.
    FanOut,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub chunk_policy: ChunkPolicy,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimit,
    pub request_timeout: Duration,
    pub dispatch_mode: DispatchMode,
    /// Skip a failing file instead of aborting the batch.
    pub continue_on_file_error: bool,
    /// Merge all files into one chat before analysis.
    pub combine_files: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            chunk_policy: ChunkPolicy::default(),
            retry: RetryPolicy::default(),
            rate_limit: RateLimit::default(),
            request_timeout: Duration::from_secs(120),
            dispatch_mode: DispatchMode::default(),
            continue_on_file_error: false,
            combine_files: false,
        }
    }
}

/// Service for chunked, multi-provider chat analysis.
///
/// Orchestrates the flow:
/// 1. Normalize each export
/// 2. Split its text messages into chunks
/// 3. Prompt a provider per chunk (with retry), parse and validate the reply
/// 4. Aggregate per file, then across files
pub struct AnalysisService {
    gateway: ProviderGateway,
    prompts: PromptBuilder,
    options: AnalysisOptions,
}

/// Where one run currently is, for progress scaling.
#[derive(Clone, Copy)]
struct Stage {
    file_index: usize,
    file_count: usize,
}

impl Stage {
    fn percent(&self, done: usize, total: usize) -> u8 {
        let within = if total == 0 { 100 } else { done * 100 / total };
        let pct = (self.file_index * 100 + within) / self.file_count.max(1);
        pct.min(100) as u8
    }
}

impl AnalysisService {
    /// Create a new analysis service.
    ///
    /// # Arguments
    /// * `providers` - Configured analysis backends (Gemini, OpenAI-compatible, Mock, ...)
    /// * `options` - Chunking, retry, pacing and batch policy
    ///
    /// Fails with `NoProviderConfigured` when `providers` is empty.
    pub fn new(
        providers: Vec<Arc<dyn AnalysisProvider>>,
        options: AnalysisOptions,
    ) -> Result<Self, DomainError> {
        let gateway = ProviderGateway::new(providers, options.rate_limit, options.request_timeout)?;
        Ok(Self {
            gateway,
            prompts: PromptBuilder::new(),
            options,
        })
    }

    /// Build the provider list from credentials, then the service.
    pub fn from_credentials(
        credentials: &ProviderCredentials,
        options: AnalysisOptions,
    ) -> Result<Self, DomainError> {
        Self::new(build_providers(credentials)?, options)
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    /// Analyze one normalized chat. Any chunk failure fails the whole chat.
    pub async fn analyze_chat(
        &self,
        chat: &ParsedChatData,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<AnalysisResult, DomainError> {
        let stage = Stage {
            file_index: 0,
            file_count: 1,
        };
        let result = self.analyze_stage(chat, stage, on_progress).await?;
        emit(on_progress, 100, "Analysis complete");
        Ok(result)
    }

    /// Analyze a batch of exports and build the report.
    ///
    /// A failing file aborts the batch with `FileFailed` unless `continue_on_file_error` is set,
    /// in which case it is logged and skipped.
    pub async fn analyze_exports(
        &self,
        files: &[ExportFile],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<AnalysisReport, DomainError> {
        info!(files = files.len(), mode = ?self.options.dispatch_mode, "starting analysis");

        let report = if self.options.combine_files {
            self.analyze_combined(files, on_progress).await?
        } else {
            self.analyze_each(files, on_progress).await?
        };

        emit(on_progress, 100, "Analysis complete");
        info!(
            files = report.files.len(),
            categories = report.category_scores.len(),
            "analysis complete"
        );
        Ok(report)
    }

    async fn analyze_each(
        &self,
        files: &[ExportFile],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<AnalysisReport, DomainError> {
        let mut reports = Vec::new();

        for (file_index, file) in files.iter().enumerate() {
            let stage = Stage {
                file_index,
                file_count: files.len(),
            };
            emit(
                on_progress,
                stage.percent(0, 1),
                &format!("Processing file {} of {}...", file_index + 1, files.len()),
            );

            let outcome = match file.parse() {
                Ok(chat) => self
                    .analyze_stage(&chat, stage, on_progress)
                    .await
                    .map(|analysis| FileReport::new(&file.name, chat.summary(), analysis)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => self.file_failed(file_index, &file.name, e)?,
            }
        }

        let analyses: Vec<AnalysisResult> = reports.iter().map(|r| r.analysis.clone()).collect();
        let batch = aggregate(&analyses)?;
        Ok(AnalysisReport::new(reports, batch))
    }

    async fn analyze_combined(
        &self,
        files: &[ExportFile],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<AnalysisReport, DomainError> {
        let mut chats = Vec::new();
        for (file_index, file) in files.iter().enumerate() {
            match file.parse() {
                Ok(chat) => chats.push(chat),
                Err(e) => self.file_failed(file_index, &file.name, e)?,
            }
        }

        let combined = ParsedChatData::combine(chats)?;
        info!(
            participants = combined.participants.len(),
            messages = combined.message_count,
            start = ?combined.time_span.start(),
            end = ?combined.time_span.end(),
            "analyzing combined chat"
        );

        let stage = Stage {
            file_index: 0,
            file_count: 1,
        };
        let analysis = self.analyze_stage(&combined, stage, on_progress).await?;
        let file = FileReport::new("combined", combined.summary(), analysis.clone());
        Ok(AnalysisReport::new(vec![file], analysis))
    }

    /// Apply the per-file failure policy: `Ok` means skip and continue.
    fn file_failed(
        &self,
        file_index: usize,
        name: &str,
        error: DomainError,
    ) -> Result<(), DomainError> {
        if self.options.continue_on_file_error {
            warn!(file_index, file = %name, error = %error, "skipping failed file");
            Ok(())
        } else {
            Err(DomainError::FileFailed {
                file_index,
                source: Box::new(error),
            })
        }
    }

    async fn analyze_stage(
        &self,
        chat: &ParsedChatData,
        stage: Stage,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<AnalysisResult, DomainError> {
        let chunks = chunk_messages(&chat.text_messages, self.options.chunk_policy);
        if chunks.is_empty() {
            info!(file_index = stage.file_index, "no text messages, nothing to analyze");
            return Ok(AnalysisResult::default());
        }

        let mut analyses = Vec::with_capacity(chunks.len());
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            emit(
                on_progress,
                stage.percent(chunk_index, chunks.len()),
                &format!("Analyzing chunk {} of {}...", chunk_index + 1, chunks.len()),
            );

            let analysis = self.analyze_chunk(&chat.participants, chunk, chunk_index).await?;
            analyses.push(analysis);

            emit(
                on_progress,
                stage.percent(chunk_index + 1, chunks.len()),
                &format!("Completed chunk {} of {}", chunk_index + 1, chunks.len()),
            );
        }

        aggregate(&analyses)
    }

    async fn analyze_chunk(
        &self,
        participants: &[String],
        chunk: &[Message],
        chunk_index: usize,
    ) -> Result<AnalysisResult, DomainError> {
        let prompt = self.prompts.build(participants, chunk)?;
        let label = format!("chunk {}", chunk_index);

        self.options
            .retry
            .run(&label, || self.attempt(&prompt))
            .await
            .map_err(|failure| {
                warn!(
                    chunk = chunk_index,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "chunk failed"
                );
                DomainError::ChunkFailed {
                    chunk_index,
                    attempts: failure.attempts,
                    source: Box::new(failure.error),
                }
            })
    }

    /// One attempt: dispatch per mode, parse and validate.
    async fn attempt(&self, prompt: &str) -> Result<AnalysisResult, DomainError> {
        match self.options.dispatch_mode {
            DispatchMode::RoundRobin => {
                let reply = self.gateway.dispatch(prompt).await;
                parse_analysis(&reply.result?)
            }
            DispatchMode::FanOut => merge_candidates(self.gateway.fan_out(prompt).await),
        }
    }
}

/// Aggregate every valid fan-out candidate. With none, the error is transient only if every
/// provider failed transiently.
fn merge_candidates(replies: Vec<ProviderReply>) -> Result<AnalysisResult, DomainError> {
    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    let mut all_transient = true;

    for reply in replies {
        match reply.result.and_then(|text| parse_analysis(&text)) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                all_transient &= e.is_transient();
                failures.push(format!("{}: {}", reply.provider, e));
            }
        }
    }

    if candidates.is_empty() {
        return Err(DomainError::Provider {
            provider: "fan-out".to_string(),
            message: failures.join("; "),
            transient: all_transient,
        });
    }
    aggregate(&candidates)
}

fn emit(on_progress: Option<&ProgressFn<'_>>, percent: u8, status: &str) {
    if let Some(callback) = on_progress {
        callback(percent, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Reply {
        Ok(String),
        Fail,
        Garbage,
    }

    /// Replays a script, then reports overload forever.
    struct Scripted {
        name: &'static str,
        script: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(name: &'static str, script: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AnalysisProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn analyze(&self, _prompt: &str) -> Result<String, DomainError> {
            self.calls.lock().unwrap().push(Instant::now());
            match self.script.lock().unwrap().pop_front() {
                Some(Reply::Ok(text)) => Ok(text),
                Some(Reply::Fail) => Err(DomainError::provider(self.name, "invalid request")),
                Some(Reply::Garbage) => Ok("Sorry, I can't do that.".to_string()),
                None => Err(DomainError::overloaded(self.name, "The model is overloaded")),
            }
        }
    }

    fn trust(score: u32) -> Reply {
        Reply::Ok(format!(
            r#"{{"descriptive":{{}},"quantitative":{{"trust_level":{}}}}}"#,
            score
        ))
    }

    fn options(chunk_size: usize) -> AnalysisOptions {
        AnalysisOptions {
            chunk_policy: ChunkPolicy::MaxMessages(chunk_size),
            retry: RetryPolicy::new(3, Duration::from_millis(100)),
            rate_limit: RateLimit {
                requests_per_minute: 1000,
                min_delay: Duration::ZERO,
            },
            request_timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    fn service(providers: Vec<Arc<Scripted>>, options: AnalysisOptions) -> AnalysisService {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn AnalysisProvider>)
            .collect();
        AnalysisService::new(providers, options).unwrap()
    }

    fn export(name: &str, texts: &[&str]) -> ExportFile {
        let messages: Vec<serde_json::Value> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                serde_json::json!({
                    "sender_name": if i % 2 == 0 { "Ana" } else { "Ben" },
                    "timestamp_ms": 1_700_000_000_000i64 + i as i64 * 60_000,
                    "content": text,
                })
            })
            .collect();
        let json = serde_json::json!({
            "participants": [{"name": "Ana"}, {"name": "Ben"}],
            "messages": messages,
        });
        ExportFile::new(name, json.to_string())
    }

    fn chat(texts: &[&str]) -> ParsedChatData {
        export("chat.json", texts).parse().unwrap()
    }

    #[tokio::test]
    async fn test_two_chunks_average_scores() {
        let provider = Scripted::new("p", vec![trust(90), trust(70)]);
        let service = service(vec![provider], options(1));

        let result = service.analyze_chat(&chat(&["hi", "hello"]), None).await.unwrap();

        assert_eq!(result.score("trust_level"), Some(80.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_with_chunk_index() {
        let provider = Scripted::new("p", vec![trust(90)]);
        let service = service(vec![provider.clone()], options(1));

        let err = service
            .analyze_chat(&chat(&["one", "two"]), None)
            .await
            .unwrap_err();

        match err {
            DomainError::ChunkFailed {
                chunk_index,
                attempts,
                source,
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(attempts, 4);
                assert!(source.is_transient());
            }
            other => panic!("expected ChunkFailed, got {:?}", other),
        }

        // 1 call for chunk 0, then the first attempt plus 3 retries for chunk 1
        let calls = provider.call_times();
        assert_eq!(calls.len(), 5);
        let gaps: Vec<Duration> = calls[1..].windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.windows(2).all(|g| g[1] > g[0]), "gaps: {:?}", gaps);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_is_not_retried() {
        let provider = Scripted::new("p", vec![Reply::Garbage]);
        let service = service(vec![provider.clone()], options(30));

        let err = service.analyze_chat(&chat(&["hi"]), None).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::ChunkFailed { chunk_index: 0, attempts: 1, ref source }
                if matches!(**source, DomainError::Parse { .. })
        ));
        assert_eq!(provider.call_times().len(), 1);
    }

    #[tokio::test]
    async fn test_no_text_messages_yield_empty_analysis() {
        let provider = Scripted::new("p", vec![]);
        let service = service(vec![provider.clone()], options(30));

        let result = service.analyze_chat(&chat(&[]), None).await.unwrap();

        assert!(result.is_empty());
        assert!(provider.call_times().is_empty());
    }

    #[tokio::test]
    async fn test_batch_aggregates_files_and_reports_progress() {
        let provider = Scripted::new("p", vec![trust(100), trust(80), trust(40)]);
        let service = service(vec![provider], options(1));
        let files = vec![export("a.json", &["x", "y"]), export("b.json", &["z"])];

        let seen = Mutex::new(Vec::new());
        let on_progress =
            |pct: u8, status: &str| seen.lock().unwrap().push((pct, status.to_string()));
        let report = service.analyze_exports(&files, Some(&on_progress)).await.unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].analysis.score("trust_level"), Some(90.0));
        assert_eq!(report.files[1].analysis.score("trust_level"), Some(40.0));
        assert_eq!(report.analysis.score("trust_level"), Some(65.0));

        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0), "{:?}", seen);
        assert!(seen.contains(&(50, "Processing file 2 of 2...".to_string())));
        assert_eq!(seen.last().map(|s| s.0), Some(100));
    }

    #[tokio::test]
    async fn test_progress_never_decreases_across_skipped_and_empty_files() {
        let provider = Scripted::new("p", vec![trust(90), trust(70)]);
        let service = service(
            vec![provider],
            AnalysisOptions {
                continue_on_file_error: true,
                ..options(30)
            },
        );
        let files = vec![
            export("first.json", &["hi"]),
            export("empty.json", &[]),
            ExportFile::new("broken.json", "not json"),
            export("last.json", &["bye"]),
        ];

        let seen = Mutex::new(Vec::new());
        let on_progress = |pct: u8, _: &str| seen.lock().unwrap().push(pct);
        let report = service.analyze_exports(&files, Some(&on_progress)).await.unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.analysis.score("trust_level"), Some(80.0));

        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        // file starts are scaled by file index: 0, 25, 50, 75
        for start in [0, 25, 50, 75] {
            assert!(seen.contains(&start), "{:?}", seen);
        }
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_bad_file_aborts_batch_by_default() {
        let provider = Scripted::new("p", vec![trust(50)]);
        let service = service(vec![provider], options(30));
        let files = vec![ExportFile::new("bad.json", "{\"nope\": 1}"), export("ok.json", &["hi"])];

        let err = service.analyze_exports(&files, None).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::FileFailed { file_index: 0, ref source }
                if matches!(**source, DomainError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_file_skipped_when_continuing() {
        let provider = Scripted::new("p", vec![trust(50)]);
        let service = service(
            vec![provider],
            AnalysisOptions {
                continue_on_file_error: true,
                ..options(30)
            },
        );
        let files = vec![ExportFile::new("bad.json", "not json"), export("ok.json", &["hi"])];

        let report = service.analyze_exports(&files, None).await.unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].name, "ok.json");
        assert_eq!(report.analysis.score("trust_level"), Some(50.0));
    }

    #[tokio::test]
    async fn test_combined_mode_analyzes_merged_chat_once() {
        let provider = Scripted::new("p", vec![trust(60)]);
        let service = service(
            vec![provider.clone()],
            AnalysisOptions {
                combine_files: true,
                ..options(30)
            },
        );
        let files = vec![export("a.json", &["x", "y"]), export("b.json", &["z"])];

        let report = service.analyze_exports(&files, None).await.unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].name, "combined");
        assert_eq!(report.files[0].chat.message_count, 3);
        assert_eq!(provider.call_times().len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_merges_valid_candidates() {
        let a = Scripted::new("a", vec![trust(90)]);
        let b = Scripted::new("b", vec![Reply::Fail]);
        let c = Scripted::new("c", vec![trust(70)]);
        let service = service(
            vec![a, b, c],
            AnalysisOptions {
                dispatch_mode: DispatchMode::FanOut,
                ..options(30)
            },
        );

        let result = service.analyze_chat(&chat(&["hi"]), None).await.unwrap();

        assert_eq!(result.score("trust_level"), Some(80.0));
    }

    #[test]
    fn test_fan_out_with_no_candidates_keeps_transience() {
        let replies = vec![
            ProviderReply {
                provider: "a".into(),
                result: Err(DomainError::overloaded("a", "busy")),
            },
            ProviderReply {
                provider: "b".into(),
                result: Err(DomainError::provider("b", "bad key")),
            },
        ];
        assert!(!merge_candidates(replies).unwrap_err().is_transient());

        let replies = vec![ProviderReply {
            provider: "a".into(),
            result: Err(DomainError::overloaded("a", "busy")),
        }];
        assert!(merge_candidates(replies).unwrap_err().is_transient());
    }
}
