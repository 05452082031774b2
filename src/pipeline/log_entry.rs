//! Per-step import-log scope with in-memory metrics.

use serde_json::{Map, Value};

use crate::model::ImportStatus;
use crate::storage::{import_log_store, Database};

use super::Result;

/// Accumulates named metrics for one step execution and writes them to
/// the import log on finalize. Metrics live in memory until then, so a
/// step that dies mid-run leaves an `in progress` row with no report,
/// which is itself the signal that the run was interrupted.
pub struct LogEntry {
    log_db: Option<Database>,
    import_log_id: Option<i64>,
    source: String,
    metrics: Map<String, Value>,
}

impl LogEntry {
    /// Open an import-log row on the log database and return its scope.
    pub async fn start(log_db: &Database, source: &str) -> Result<LogEntry> {
        let mut conn = log_db.acquire().await?;
        let import_log = import_log_store::create_import_log(&mut conn, source).await?;
        Ok(LogEntry {
            log_db: Some(log_db.clone()),
            import_log_id: Some(import_log.import_log_id),
            source: source.to_string(),
            metrics: Map::new(),
        })
    }

    /// A scope with no backing row. Metrics accumulate but finalize is a
    /// no-op. Used by tests that exercise a step body directly.
    pub fn detached(source: &str) -> LogEntry {
        LogEntry {
            log_db: None,
            import_log_id: None,
            source: source.to_string(),
            metrics: Map::new(),
        }
    }

    pub fn import_log_id(&self) -> Option<i64> {
        self.import_log_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn increment(&mut self, name: &str) {
        self.increment_by(name, 1);
    }

    pub fn increment_by(&mut self, name: &str, amount: i64) {
        let current = self
            .metrics
            .get(name)
            .and_then(Value::as_i64)
            .unwrap_or(0);
        self.metrics
            .insert(name.to_string(), Value::from(current + amount));
    }

    pub fn set_metric(&mut self, name: &str, value: Value) {
        self.metrics.insert(name.to_string(), value);
    }

    pub fn metrics(&self) -> &Map<String, Value> {
        &self.metrics
    }

    /// Close the import-log row with the given status and the flattened
    /// metric report.
    pub async fn finalize(self, status: ImportStatus) -> Result<()> {
        let (Some(log_db), Some(import_log_id)) = (self.log_db, self.import_log_id) else {
            return Ok(());
        };
        let report = Value::Object(flatten_metrics(&self.metrics));
        let mut conn = log_db.acquire().await?;
        import_log_store::finalize_import_log(&mut conn, import_log_id, status, &report).await?;
        Ok(())
    }
}

/// Flatten nested metric objects into a single-level map whose keys join
/// the nesting path with `_`. Scalars and arrays pass through unchanged.
pub fn flatten_metrics(metrics: &Map<String, Value>) -> Map<String, Value> {
    fn walk(prefix: &str, value: &Value, flat: &mut Map<String, Value>) {
        match value {
            Value::Object(nested) => {
                for (key, inner) in nested {
                    let joined = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}_{key}")
                    };
                    walk(&joined, inner, flat);
                }
            }
            other => {
                flat.insert(prefix.to_string(), other.clone());
            }
        }
    }

    let mut flat = Map::new();
    for (key, value) in metrics {
        walk(key, value, &mut flat);
    }
    flat
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flatten_joins_nested_keys_with_underscores() {
        let metrics = json!({
            "records_processed": 12,
            "counts": {
                "claimant": { "ok": 10, "errored": 2 },
                "payment": 7
            }
        });
        let Value::Object(metrics) = metrics else {
            unreachable!()
        };

        let flat = flatten_metrics(&metrics);

        assert_eq!(flat.get("records_processed"), Some(&json!(12)));
        assert_eq!(flat.get("counts_claimant_ok"), Some(&json!(10)));
        assert_eq!(flat.get("counts_claimant_errored"), Some(&json!(2)));
        assert_eq!(flat.get("counts_payment"), Some(&json!(7)));
        assert!(flat.values().all(|value| !value.is_object()));
    }

    #[test]
    fn test_flatten_leaves_scalars_and_arrays_alone() {
        let Value::Object(metrics) = json!({
            "files": ["a.csv", "b.csv"],
            "empty": {},
        }) else {
            unreachable!()
        };

        let flat = flatten_metrics(&metrics);

        assert_eq!(flat.get("files"), Some(&json!(["a.csv", "b.csv"])));
        // An empty object contributes nothing.
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_increment_accumulates() {
        let mut entry = LogEntry::detached("test");
        entry.increment("seen");
        entry.increment("seen");
        entry.increment_by("seen", 3);
        assert_eq!(entry.metrics().get("seen"), Some(&json!(5)));
    }
}
