//! AI-backed extraction.
//!
//! The model itself lives outside the workspace: [`CommandClient`] runs a
//! configured program that receives `{"system": ..., "user": ...}` as JSON
//! on stdin and prints a JSON amendment object on stdout. The response is
//! loaded through [`AmendmentRecord`], the same path session files use.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use amendment_core::{AmendmentRecord, AmendmentType, Email, RecordError, ValidationError};
use serde::Serialize;
use serde_json::{Map, Value};
use wait_timeout::ChildExt;

use crate::config::AiConfig;
use crate::error::{ExtractionMiss, ProviderError, StrategyError};
use crate::events::{EventLog, EventSink};
use crate::strategy::{Extraction, ExtractionStrategy};

pub const COMPONENT: &str = "ai_strategy";

/// How long pipe threads get to finish after a timed-out child is killed.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You extract Model United Nations amendments from delegate emails.
Reply with a single JSON object and nothing else. Use these keys:
  "submitter_delegate": the delegation proposing the amendment (required)
  "resolution_topic": the resolution topic, usually starting with "On"
  "resolution_main_submitter": the main submitter of that resolution
  "clause": the operative clause number (required)
  "sub_clause": the sub-clause letter, without brackets
  "sub_sub_clause": the sub-sub-clause roman numeral, without brackets
  "amendment_type": one of "ADD", "AMEND", "STRIKE"
  "text": the new wording; required for ADD and AMEND, omitted for STRIKE
  "reason": the stated justification, if any
Omit keys you cannot determine. If the email does not propose an amendment,
reply with {}."#;

/// Text completion capability.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    system: &'a str,
    user: &'a str,
}

/// Runs an external program per completion.
#[derive(Debug, Clone)]
pub struct CommandClient {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_millis(config.timeout_ms))
    }
}

impl CompletionClient for CommandClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(ProviderError::NotConfigured);
        };
        let request = serde_json::to_vec(&CompletionRequest {
            system: system_prompt,
            user: user_prompt,
        })
        .map_err(|err| ProviderError::Io(err.into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                command: self.command.join(" "),
                source,
            })?;

        // Pipes are serviced on their own threads so a chatty child never
        // blocks on a full buffer.
        let stdin_thread = child.stdin.take().map(|mut pipe| {
            thread::spawn(move || {
                let result = pipe.write_all(&request);
                drop(pipe);
                result
            })
        });
        let stdout_thread = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).map(|_| buf)
            })
        });
        let stderr_thread = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let deadline = Instant::now() + PIPE_DRAIN_GRACE;
                reap_pipe_thread(stdin_thread, deadline);
                reap_pipe_thread(stdout_thread, deadline);
                reap_pipe_thread(stderr_thread, deadline);
                return Err(ProviderError::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if let Some(handle) = stdin_thread {
            match handle.join() {
                Ok(Ok(())) => {}
                // The child may exit without reading its input.
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(pipe_thread_panicked()),
            }
        }
        let stdout = join_reader(stdout_thread)?;
        let stderr = join_reader(stderr_thread)?;

        if !status.success() {
            return Err(ProviderError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        String::from_utf8(stdout).map_err(|err| {
            ProviderError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })
    }
}

fn pipe_thread_panicked() -> ProviderError {
    ProviderError::Io(std::io::Error::other("provider pipe thread panicked"))
}

/// Joins a pipe thread that finishes before `deadline`. A thread still
/// running then is left detached: a grandchild of the killed program holds
/// the pipe open, and the thread exits once that process closes it.
fn reap_pipe_thread<T>(handle: Option<thread::JoinHandle<T>>, deadline: Instant) -> bool {
    let Some(handle) = handle else {
        return true;
    };
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    let _ = handle.join();
    true
}

fn join_reader(
    handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, ProviderError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| pipe_thread_panicked())?
            .map_err(ProviderError::from),
        None => Ok(Vec::new()),
    }
}

/// Removes a surrounding Markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Loads an AI response into an amendment.
///
/// Non-objects and unparsable text are [`ExtractionMiss::MalformedResponse`],
/// `{}` is [`ExtractionMiss::EmptyResponse`] and a missing required field is
/// [`ExtractionMiss::MissingField`]. An unrecognized `amendment_type` is
/// logged and read as AMEND. Identity fields in the response are ignored;
/// the amendment gets a fresh id and timestamp. `context` defaults to
/// `fallback_context`.
///
/// # Errors
///
/// The [`ValidationError`] of a complete but invalid candidate.
pub fn amendment_from_response(
    raw: &str,
    fallback_context: &str,
    log: &EventLog,
) -> Result<Extraction, ValidationError> {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(err) => return Ok(ExtractionMiss::MalformedResponse(err.to_string()).into()),
    };
    let Value::Object(mut object) = value else {
        return Ok(ExtractionMiss::MalformedResponse("expected a JSON object".to_string()).into());
    };
    if object.is_empty() {
        return Ok(ExtractionMiss::EmptyResponse.into());
    }

    object.remove("id");
    object.remove("created_at");
    coerce_amendment_type(&mut object, log);
    if !object.contains_key("context") {
        object.insert("context".to_string(), Value::String(fallback_context.to_string()));
    }

    let record: AmendmentRecord = match serde_json::from_value(Value::Object(object)) {
        Ok(record) => record,
        Err(err) => return Ok(ExtractionMiss::MalformedResponse(err.to_string()).into()),
    };
    match record.into_amendment() {
        Ok(amendment) => Ok(Extraction::Amendment(amendment)),
        Err(RecordError::MissingField(field)) => Ok(ExtractionMiss::MissingField(field).into()),
        Err(RecordError::UnknownAmendmentType(raw)) => {
            Ok(ExtractionMiss::MalformedResponse(format!("unknown amendment type: {raw}")).into())
        }
        Err(RecordError::Invalid(err)) => Err(err),
    }
}

fn coerce_amendment_type(object: &mut Map<String, Value>, log: &EventLog) {
    let Some(Value::String(raw)) = object.get("amendment_type") else {
        return;
    };
    if raw.trim().is_empty() || raw.parse::<AmendmentType>().is_ok() {
        return;
    }
    log.warn(format!("unknown amendment type {raw:?} in response; using AMEND"));
    object.insert(
        "amendment_type".to_string(),
        Value::String(AmendmentType::Amend.as_str().to_string()),
    );
}

/// Extraction through a [`CompletionClient`].
#[derive(Clone)]
pub struct AiStrategy {
    client: Arc<dyn CompletionClient>,
    system_prompt: String,
    log: EventLog,
}

impl std::fmt::Debug for AiStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiStrategy")
            .field("system_prompt_len", &self.system_prompt.len())
            .finish_non_exhaustive()
    }
}

impl AiStrategy {
    pub fn new(client: Arc<dyn CompletionClient>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            log: EventLog::new(sink, COMPONENT),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(email: &Email) -> String {
        format!("Please extract an amendment from the following email:\n\n{email}\n")
    }
}

impl ExtractionStrategy for AiStrategy {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn extract(&self, email: &Email) -> Result<Extraction, StrategyError> {
        let response = self
            .client
            .complete(&self.system_prompt, &Self::user_prompt(email))?;
        self.log
            .debug(format!("received {} byte response", response.len()));
        let extraction = amendment_from_response(&response, &email.body, &self.log)?;
        if let Extraction::Miss(miss) = &extraction {
            self.log.info(format!("no amendment in response: {miss}"));
        }
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, Severity};

    struct CannedClient(String);

    impl CompletionClient for CannedClient {
        fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            assert!(user.contains("Please extract an amendment"));
            Ok(self.0.clone())
        }
    }

    fn log() -> (EventLog, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (EventLog::new(sink.clone(), COMPONENT), sink)
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn test_response_guards() {
        let (log, _) = log();
        assert_eq!(
            amendment_from_response("{}", "", &log).unwrap(),
            Extraction::Miss(ExtractionMiss::EmptyResponse)
        );
        assert!(matches!(
            amendment_from_response("[1, 2]", "", &log).unwrap(),
            Extraction::Miss(ExtractionMiss::MalformedResponse(_))
        ));
        assert!(matches!(
            amendment_from_response("not json", "", &log).unwrap(),
            Extraction::Miss(ExtractionMiss::MalformedResponse(_))
        ));
        assert_eq!(
            amendment_from_response(r#"{"clause": "4"}"#, "", &log).unwrap(),
            Extraction::Miss(ExtractionMiss::MissingField("submitter_delegate"))
        );
    }

    #[test]
    fn test_response_unknown_type_becomes_amend() {
        let (log, sink) = log();
        let raw = r#"{"submitter_delegate": "Ghana", "clause": 2, "amendment_type": "MODIFY", "text": "x"}"#;
        let amendment = amendment_from_response(raw, "body", &log)
            .unwrap()
            .into_amendment()
            .unwrap();
        assert_eq!(amendment.amendment_type(), AmendmentType::Amend);
        assert_eq!(amendment.clause(), "2");
        assert_eq!(amendment.context(), "body");
        assert_eq!(sink.matching(COMPONENT, Severity::Warn).len(), 1);
    }

    #[test]
    fn test_response_ignores_identity_fields() {
        let (log, _) = log();
        let raw = r#"{"id": "fixed", "created_at": "2001-01-01T00:00:00Z",
                      "submitter_delegate": "Ghana", "clause": "1", "amendment_type": "STRIKE"}"#;
        let amendment = amendment_from_response(raw, "", &log)
            .unwrap()
            .into_amendment()
            .unwrap();
        assert_ne!(amendment.id(), "fixed");
        assert_ne!(amendment.created_at(), "2001-01-01T00:00:00Z");
    }

    #[test]
    fn test_response_invalid_candidate_is_error() {
        let (log, _) = log();
        let raw = r#"{"submitter_delegate": "Ghana", "clause": "1", "amendment_type": "STRIKE", "text": "x"}"#;
        assert_eq!(
            amendment_from_response(raw, "", &log).unwrap_err(),
            ValidationError::StrikeWithText
        );
    }

    #[test]
    fn test_strategy_uses_client() {
        let client = Arc::new(CannedClient(
            r#"{"submitter_delegate": "India", "clause": "3.a", "amendment_type": "ADD", "text": "w"}"#
                .to_string(),
        ));
        let strategy = AiStrategy::new(client, Arc::new(MemorySink::new()));
        let email = Email::new("india@mun.org", "amendment", "body");
        let amendment = strategy.extract(&email).unwrap().into_amendment().unwrap();
        assert_eq!(amendment.submitter_delegate(), "India");
        assert_eq!(amendment.clause(), "3.a");
    }

    #[test]
    fn test_command_client_not_configured() {
        let client = CommandClient::new(Vec::new(), Duration::from_secs(1));
        assert!(matches!(
            client.complete("s", "u"),
            Err(ProviderError::NotConfigured)
        ));
    }

    #[test]
    fn test_command_client_spawn_failure() {
        let client = CommandClient::new(
            vec!["definitely-not-a-real-provider-binary".to_string()],
            Duration::from_secs(1),
        );
        assert!(matches!(
            client.complete("s", "u"),
            Err(ProviderError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_client_round_trips_stdin() {
        let client = CommandClient::new(vec!["cat".to_string()], Duration::from_secs(10));
        let output = client.complete("sys", "usr").unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["system"], "sys");
        assert_eq!(value["user"], "usr");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_client_times_out() {
        let client = CommandClient::new(
            vec!["sleep".to_string(), "5".to_string()],
            Duration::from_millis(100),
        );
        assert!(matches!(
            client.complete("s", "u"),
            Err(ProviderError::Timeout { timeout_ms: 100 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_returns_while_grandchild_holds_pipes() {
        let client = CommandClient::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 3 & sleep 3".to_string()],
            Duration::from_millis(100),
        );
        let started = Instant::now();
        assert!(matches!(
            client.complete("s", "u"),
            Err(ProviderError::Timeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_reap_pipe_thread_joins_finished_and_detaches_stuck() {
        let deadline = Instant::now() + Duration::from_millis(200);
        assert!(reap_pipe_thread(Some(thread::spawn(|| 7)), deadline));
        assert!(reap_pipe_thread::<()>(None, deadline));

        let (release, wait) = std::sync::mpsc::channel::<()>();
        let stuck = thread::spawn(move || {
            let _ = wait.recv();
        });
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!reap_pipe_thread(Some(stuck), deadline));
        let _ = release.send(());
    }
}
