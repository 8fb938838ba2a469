//! In-Memory Job Tracker Implementation

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::application::commands::ResponsePayload;
use crate::application::ports::{JobCounts, JobRecord, JobState, JobTrackerPort, TrackerError};
use crate::domain::synthesis::JobId;

/// 内存任务追踪器
///
/// 终态记录只保留最近 `max_finished` 条，供 `/status` 查询
pub struct InMemoryJobTracker {
    /// job_id -> JobRecord
    jobs: DashMap<String, JobRecord>,
    /// 已结束任务的 ID，按结束顺序
    finished: Mutex<VecDeque<String>>,
    max_finished: usize,
}

impl InMemoryJobTracker {
    pub fn new(max_finished: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            finished: Mutex::new(VecDeque::new()),
            max_finished: max_finished.max(1),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn evict_finished(&self, job_id: &str) {
        let evicted: Vec<String> = {
            let mut finished = match self.finished.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            finished.retain(|id| id != job_id);
            finished.push_back(job_id.to_string());

            let overflow = finished.len().saturating_sub(self.max_finished);
            finished.drain(..overflow).collect()
        };

        for id in evicted {
            self.jobs.remove_if(&id, |_, record| record.state.is_terminal());
        }
    }
}

impl JobTrackerPort for InMemoryJobTracker {
    fn register(&self, job_id: &JobId) -> Result<(), TrackerError> {
        match self.jobs.entry(job_id.as_str().to_string()) {
            // 同 ID 的已结束任务可以被重新提交
            Entry::Occupied(mut entry) => {
                if !entry.get().state.is_terminal() {
                    return Err(TrackerError::AlreadyActive(job_id.to_string()));
                }
                entry.insert(JobRecord::new(job_id));
            }
            Entry::Vacant(entry) => {
                entry.insert(JobRecord::new(job_id));
            }
        }

        tracing::debug!(job_id = %job_id, "Job registered");
        Ok(())
    }

    fn transition(&self, job_id: &JobId, state: JobState) {
        if let Some(mut record) = self.jobs.get_mut(job_id.as_str()) {
            if record.state.is_terminal() {
                tracing::warn!(
                    job_id = %job_id,
                    from = record.state.as_str(),
                    to = state.as_str(),
                    "Ignoring transition of finished job"
                );
                return;
            }
            tracing::debug!(
                job_id = %job_id,
                from = record.state.as_str(),
                to = state.as_str(),
                "Job state changed"
            );
            record.state = state;
            record.updated_at = Utc::now();
        }
    }

    fn finish(&self, job_id: &JobId, state: JobState, response: ResponsePayload) {
        let now = Utc::now();
        self.jobs
            .entry(job_id.as_str().to_string())
            .and_modify(|record| {
                record.state = state;
                record.updated_at = now;
                record.finished_at = Some(now);
                record.response = Some(response.clone());
            })
            .or_insert_with(|| JobRecord {
                state,
                updated_at: now,
                finished_at: Some(now),
                response: Some(response.clone()),
                ..JobRecord::new(job_id)
            });

        self.evict_finished(job_id.as_str());
    }

    fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.get(job_id).map(|r| r.clone())
    }

    fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for record in self.jobs.iter() {
            match record.state {
                JobState::Completed => counts.completed += 1,
                JobState::Rejected | JobState::Failed => counts.failed += 1,
                _ => counts.in_progress += 1,
            }
        }
        counts
    }
}
