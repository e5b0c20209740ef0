
use super::*;
use chrono::{Duration, Utc};

/// New pending task with an explicit creation time
pub(super) fn pending_task(url: &str, created_at: chrono::DateTime<Utc>) -> NewTask {
    NewTask {
        url: url.to_string(),
        status: TaskStatus::Pending,
        created_at,
        config_snapshot: r#"{"resolution":"720p"}"#.to_string(),
    }
}

/// Creation times one second apart, oldest first
pub(super) fn ascending_times(count: usize) -> Vec<chrono::DateTime<Utc>> {
    let base = Utc::now() - Duration::seconds(count as i64 + 10);
    (0..count)
        .map(|i| base + Duration::seconds(i as i64))
        .collect()
}
