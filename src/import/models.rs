use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

pub const JOB_ID_PREFIX: &str = "import_";

/// Structured import job identity, rendered as `import_<user_id>_<token>`.
///
/// The embedded user id is the ownership anchor for polling; the token is
/// opaque and may itself contain separators (parsing splits once after the
/// user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    user_id: usize,
    token: String,
}

impl JobId {
    pub fn new(user_id: usize, token: String) -> JobId {
        JobId { user_id, token }
    }

    pub fn parse(raw: &str) -> Option<JobId> {
        let rest = raw.strip_prefix(JOB_ID_PREFIX)?;
        let (user, token) = rest.split_once('_')?;
        let user_id = user.parse().ok()?;
        if token.is_empty() {
            return None;
        }
        Some(JobId {
            user_id,
            token: token.to_string(),
        })
    }

    pub fn user_id(&self) -> usize {
        self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}", JOB_ID_PREFIX, self.user_id, self.token)
    }
}

/// Mints monotonic job id tokens from submission time in milliseconds.
/// Same-millisecond submissions get a sequence suffix, so tokens from one
/// minter never repeat.
pub struct JobIdMinter {
    last: Mutex<(i64, u32)>,
}

impl JobIdMinter {
    pub fn new() -> JobIdMinter {
        JobIdMinter {
            last: Mutex::new((0, 0)),
        }
    }

    pub fn mint(&self, user_id: usize) -> JobId {
        let now_millis = chrono::Utc::now().timestamp_millis();
        let mut last = self.last.lock().unwrap();
        let token = if now_millis > last.0 {
            *last = (now_millis, 0);
            now_millis.to_string()
        } else {
            last.1 += 1;
            format!("{}_{}", last.0, last.1)
        };
        JobId::new(user_id, token)
    }
}

impl Default for JobIdMinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of an import job. Closed set; unknown values in storage are a
/// read error, never a fifth state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Queued => "queued",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<ImportStatus> {
        match s {
            "queued" => Some(ImportStatus::Queued),
            "processing" => Some(ImportStatus::Processing),
            "completed" => Some(ImportStatus::Completed),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import job counters. Every processed record is either added or skipped,
/// and all four values only ever grow while a job runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounters {
    pub total_records: u64,
    pub processed_records: u64,
    pub added_records: u64,
    pub skipped_records: u64,
}

impl ImportCounters {
    pub fn record_added(&mut self) {
        self.added_records += 1;
        self.processed_records += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_records += 1;
        self.processed_records += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.processed_records == self.added_records + self.skipped_records
    }
}

/// Point-in-time view of a job: status plus all four counters, written and
/// read as one unit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: ImportStatus,
    #[serde(flatten)]
    pub counters: ImportCounters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Durable import job row.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub job_id: JobId,
    pub status: ImportStatus,
    pub source_path: PathBuf,
    pub counters: ImportCounters,
    pub error_message: Option<String>,
    pub attempts: u32,
    pub created_at: i64,
    pub claimed_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl ImportJob {
    pub fn new(job_id: JobId, source_path: PathBuf) -> ImportJob {
        ImportJob {
            job_id,
            status: ImportStatus::Queued,
            source_path,
            counters: ImportCounters::default(),
            error_message: None,
            attempts: 0,
            created_at: chrono::Utc::now().timestamp(),
            claimed_at: None,
            finished_at: None,
        }
    }

    pub fn user_id(&self) -> usize {
        self.job_id.user_id()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.to_string(),
            status: self.status,
            counters: self.counters,
            error_message: self.error_message.clone(),
        }
    }
}

/// Outcome of a stale-claim sweep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StaleSweep {
    pub requeued: Vec<String>,
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn job_id_display_and_parse_roundtrip() {
        let id = JobId::new(42, "1700000000123".to_string());
        assert_eq!(id.to_string(), "import_42_1700000000123");

        let parsed = JobId::parse("import_42_1700000000123").unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.user_id(), 42);
        assert_eq!(parsed.token(), "1700000000123");
    }

    #[test]
    fn job_id_token_may_contain_separators() {
        let parsed = JobId::parse("import_7_1700000000123_4").unwrap();
        assert_eq!(parsed.user_id(), 7);
        assert_eq!(parsed.token(), "1700000000123_4");
    }

    #[test]
    fn job_id_rejects_malformed_input() {
        assert!(JobId::parse("").is_none());
        assert!(JobId::parse("job_1_2").is_none());
        assert!(JobId::parse("import_").is_none());
        assert!(JobId::parse("import_12").is_none());
        assert!(JobId::parse("import_12_").is_none());
        assert!(JobId::parse("import_abc_123").is_none());
    }

    #[test]
    fn minter_never_repeats_tokens() {
        let minter = JobIdMinter::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let id = minter.mint(1);
            assert_eq!(id.user_id(), 1);
            assert!(seen.insert(id.to_string()), "duplicate id {}", id);
        }
    }

    #[test]
    fn minted_ids_parse_back() {
        let minter = JobIdMinter::new();
        for _ in 0..5 {
            let id = minter.mint(9);
            let parsed = JobId::parse(&id.to_string()).unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn status_parse_matches_as_str() {
        for status in [
            ImportStatus::Queued,
            ImportStatus::Processing,
            ImportStatus::Completed,
            ImportStatus::Failed,
        ] {
            assert_eq!(ImportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ImportStatus::parse("cancelled"), None);

        assert!(!ImportStatus::Queued.is_terminal());
        assert!(!ImportStatus::Processing.is_terminal());
        assert!(ImportStatus::Completed.is_terminal());
        assert!(ImportStatus::Failed.is_terminal());
    }

    #[test]
    fn counters_stay_consistent() {
        let mut counters = ImportCounters::default();
        assert!(counters.is_consistent());

        counters.record_added();
        counters.record_skipped();
        counters.record_added();
        assert_eq!(counters.processed_records, 3);
        assert_eq!(counters.added_records, 2);
        assert_eq!(counters.skipped_records, 1);
        assert!(counters.is_consistent());
    }

    #[test]
    fn snapshot_serializes_counters_inline() {
        let job = ImportJob::new(JobId::new(3, "t".to_string()), "/tmp/x.json".into());
        let mut snapshot = job.snapshot();
        snapshot.counters.record_added();

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["job_id"], "import_3_t");
        assert_eq!(value["status"], "queued");
        assert_eq!(value["processed_records"], 1);
        assert_eq!(value["added_records"], 1);
        assert!(value.get("error_message").is_none());
    }
}
