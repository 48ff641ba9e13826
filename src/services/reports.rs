//! Triage for client error reports: a pseudo-random report id, a severity
//! class and a grouping fingerprint so repeats of the same failure cluster
//! in the logs.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::models::ErrorReport;

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static LINE_COL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d+:\d+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct TriagedReport {
    pub id: String,
    pub severity: Severity,
    pub fingerprint: String,
}

pub fn triage(report: &ErrorReport) -> TriagedReport {
    TriagedReport {
        id: report_id(),
        severity: severity(report),
        fingerprint: fingerprint(report),
    }
}

fn report_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("err_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

fn severity(report: &ErrorReport) -> Severity {
    let message = report.message.as_str();
    let kind = report.kind.as_deref();

    if kind == Some("critical_app_error")
        || message.contains("ChunkLoadError")
        || message.contains("Script error")
        || message.contains("Network Error")
    {
        return Severity::Critical;
    }

    let stack = report.stack.as_deref().unwrap_or("");
    if message.contains("TypeError")
        || message.contains("ReferenceError")
        || message.contains("RangeError")
        || stack.contains("at Auth")
        || stack.contains("at API")
    {
        return Severity::High;
    }

    if message.contains("Warning")
        || message.contains("Deprecated")
        || kind == Some("validation_error")
    {
        return Severity::Medium;
    }

    Severity::Low
}

/// Fingerprint from the digit-normalized message plus the first stack frame
/// with line/column numbers masked, so the same error at different
/// positions still groups together.
fn fingerprint(report: &ErrorReport) -> String {
    let message = DIGITS_RE.replace_all(&report.message, "X");
    let frame = report
        .stack
        .as_deref()
        .and_then(|stack| stack.lines().nth(1))
        .unwrap_or("");
    let frame = LINE_COL_RE.replace_all(frame, ":X:X");

    let key = format!("{message}|{frame}");
    let mut hash: u32 = 0;
    for byte in key.bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(u32::from(byte));
    }
    format!("{hash:x}")
}
