use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// One ad-hoc test case of a self-test run. Both sides are opaque binary
/// payloads carried as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input_base64: String,
    pub output_base64: String,
}

impl TestCase {
    pub fn from_bytes(input: impl AsRef<[u8]>, expected_output: impl AsRef<[u8]>) -> TestCase {
        TestCase {
            input_base64: base64::encode(input),
            output_base64: base64::encode(expected_output),
        }
    }
}

/// Which judge operation a request targets. Selects both the endpoint and the
/// shape of the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionKind {
    /// Judge against the problem's own test data.
    Submit,
    /// Judge against the supplied cases only, in order.
    SelfTest(Vec<TestCase>),
}

impl SubmissionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionKind::Submit => "submit",
            SubmissionKind::SelfTest(_) => "self_test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    question_id: i64,
    language_id: i64,
    code: String,
    kind: SubmissionKind,
}

impl SubmissionRequest {
    pub fn submit(question_id: i64, language_id: i64, code: impl Into<String>) -> Self {
        SubmissionRequest {
            question_id,
            language_id,
            code: code.into(),
            kind: SubmissionKind::Submit,
        }
    }

    pub fn self_test(
        question_id: i64,
        language_id: i64,
        code: impl Into<String>,
        cases: Vec<TestCase>,
    ) -> Self {
        SubmissionRequest {
            question_id,
            language_id,
            code: code.into(),
            kind: SubmissionKind::SelfTest(cases),
        }
    }

    pub fn question_id(&self) -> i64 {
        self.question_id
    }

    pub fn language_id(&self) -> i64 {
        self.language_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> &SubmissionKind {
        &self.kind
    }

    /// The JSON document sent to the judge.
    pub fn body(&self) -> SubmissionBody<'_> {
        SubmissionBody {
            question_id: self.question_id,
            code: &self.code,
            language_id: self.language_id,
            self_test_cases: match &self.kind {
                SubmissionKind::Submit => None,
                SubmissionKind::SelfTest(cases) => Some(cases.as_slice()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBody<'a> {
    pub question_id: i64,
    pub code: &'a str,
    pub language_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_test_cases: Option<&'a [TestCase]>,
}

/// Error document returned alongside `400 Bad Request`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
}

/// A snapshot of judge progress. Only the event with `finish` set is final;
/// earlier ones are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub finish: bool,
    #[serde(default)]
    pub judge_case_num: u32,
    #[serde(default)]
    pub accept_num: u32,
    #[serde(default)]
    pub commit_result: OutcomeCode,
    /// Elapsed time as reported by the judge.
    #[serde(default)]
    pub consume_time: u64,
    /// Peak memory as reported by the judge.
    #[serde(default)]
    pub consume_memory: u64,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        self.finish
    }

    pub fn is_accepted(&self) -> bool {
        self.finish && self.commit_result == OutcomeCode::Accepted
    }
}

/// Overall judge verdict. Codes outside `0..=7` read as [`OutcomeCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum OutcomeCode {
    Unknown = 0,
    Accepted = 1,
    WrongAnswer = 2,
    TimeLimitExceeded = 3,
    MemoryLimitExceeded = 4,
    RuntimeError = 5,
    CompileError = 6,
    SystemError = 7,
}

/// Presentation class of an [`OutcomeCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Neutral,
    Success,
    Warning,
    Failure,
}

impl OutcomeCode {
    pub fn label(self) -> &'static str {
        match self {
            OutcomeCode::Unknown => "Unknown",
            OutcomeCode::Accepted => "Accepted",
            OutcomeCode::WrongAnswer => "Wrong Answer",
            OutcomeCode::TimeLimitExceeded => "Time Limit Exceeded",
            OutcomeCode::MemoryLimitExceeded => "Memory Limit Exceeded",
            OutcomeCode::RuntimeError => "Runtime Error",
            OutcomeCode::CompileError => "Compile Error",
            OutcomeCode::SystemError => "System Error",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            OutcomeCode::Unknown => Severity::Neutral,
            OutcomeCode::Accepted => Severity::Success,
            OutcomeCode::TimeLimitExceeded | OutcomeCode::MemoryLimitExceeded => {
                Severity::Warning
            }
            OutcomeCode::WrongAnswer
            | OutcomeCode::RuntimeError
            | OutcomeCode::CompileError
            | OutcomeCode::SystemError => Severity::Failure,
        }
    }
}

impl Default for OutcomeCode {
    fn default() -> Self {
        OutcomeCode::Unknown
    }
}

impl From<i64> for OutcomeCode {
    fn from(code: i64) -> Self {
        match code {
            1 => OutcomeCode::Accepted,
            2 => OutcomeCode::WrongAnswer,
            3 => OutcomeCode::TimeLimitExceeded,
            4 => OutcomeCode::MemoryLimitExceeded,
            5 => OutcomeCode::RuntimeError,
            6 => OutcomeCode::CompileError,
            7 => OutcomeCode::SystemError,
            _ => OutcomeCode::Unknown,
        }
    }
}

impl From<OutcomeCode> for i64 {
    fn from(code: OutcomeCode) -> Self {
        code as i64
    }
}

impl Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
