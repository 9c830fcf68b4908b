//! Search execution stage
//!
//! Runs every planned search concurrently. A failing, panicking or timed-out
//! task is logged and dropped; the stage itself never fails.

use crate::research::error::SearchTaskError;
use crate::research::progress::ProgressReporter;
use crate::research::session::ResearchPhase;
use crate::research::types::{ClarificationContext, SearchTask};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Capability: run one web search and summarize what it found
#[async_trait]
pub trait SearchCapability: Send + Sync {
    /// Search for `task.query` and return a summary of the results
    async fn search(
        &self,
        task: &SearchTask,
        context: Option<&ClarificationContext>,
    ) -> Result<String, SearchTaskError>;
}

/// Model input for one search, tuned by the clarification context when present
pub fn search_input(task: &SearchTask, context: Option<&ClarificationContext>) -> String {
    match context {
        Some(context) => format!(
            "Search term: {}\nReason for searching: {}\n\n\
User's answers to clarifying questions (use these to focus the search):\n{}\n\n\
Perform the search and summarize results, prioritizing information relevant to the user's specific answers.",
            task.query,
            task.reason,
            context.as_str()
        ),
        None => format!(
            "Search term: {}\nReason for searching: {}\n\nPerform the search and summarize the results.",
            task.query, task.reason
        ),
    }
}

/// Successful summaries plus a count of the tasks that were dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Summaries in completion order
    pub results: Vec<String>,
    /// Tasks that failed, panicked or timed out
    pub failed: usize,
}

/// Fans search tasks out over the runtime
#[derive(Clone)]
pub struct SearchStage {
    search: Arc<dyn SearchCapability>,
    timeout: Duration,
}

impl SearchStage {
    /// Create the stage; every task gets `timeout` to finish
    pub fn new(search: Arc<dyn SearchCapability>, timeout: Duration) -> Self {
        Self { search, timeout }
    }

    /// Run all `tasks` and wait until each has succeeded or failed
    pub async fn execute_all(
        &self,
        tasks: &[SearchTask],
        context: Option<&ClarificationContext>,
        progress: &ProgressReporter,
    ) -> SearchOutcome {
        let total = tasks.len();
        let mut set = JoinSet::new();

        for (index, task) in tasks.iter().cloned().enumerate() {
            let search = Arc::clone(&self.search);
            let context = context.cloned();
            let deadline = self.timeout;
            set.spawn(async move {
                let result =
                    match tokio::time::timeout(deadline, search.search(&task, context.as_ref()))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SearchTaskError::TimedOut(deadline.as_secs())),
                    };
                (index, result)
            });
        }

        let mut outcome = SearchOutcome::default();
        let mut completed = 0;

        while let Some(joined) = set.join_next().await {
            completed += 1;
            match joined {
                Ok((_, Ok(summary))) if !summary.trim().is_empty() => {
                    outcome.results.push(summary)
                }
                Ok((index, Ok(_))) => {
                    tracing::warn!(task_index = index, "Search returned an empty summary, dropping");
                    outcome.failed += 1;
                }
                Ok((index, Err(e))) => {
                    tracing::warn!(task_index = index, error = %e, "Search task failed, dropping");
                    outcome.failed += 1;
                }
                Err(e) => {
                    let error = SearchTaskError::Aborted(e.to_string());
                    tracing::warn!(error = %error, "Search task dropped");
                    outcome.failed += 1;
                }
            }

            progress.tick(
                &ResearchPhase::Searching,
                format!("Searching... {}/{} completed", completed, total),
            );
        }

        tracing::info!(
            task_count = total,
            succeeded = outcome.results.len(),
            failed = outcome.failed,
            "Finished searching"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::progress::StatusKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails any task whose query starts with "fail", panics on "panic",
    /// sleeps past any deadline on "slow"
    struct ScriptedSearch {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSearch {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchCapability for ScriptedSearch {
        async fn search(
            &self,
            task: &SearchTask,
            _context: Option<&ClarificationContext>,
        ) -> Result<String, SearchTaskError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if task.query.starts_with("panic") {
                panic!("search exploded");
            }
            if task.query.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if task.query.starts_with("fail") {
                return Err(SearchTaskError::Failed("upstream error".to_string()));
            }
            Ok(format!("summary of {}", task.query))
        }
    }

    fn task(query: &str) -> SearchTask {
        SearchTask {
            query: query.to_string(),
            reason: "because".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failures_are_dropped() {
        let search = ScriptedSearch::new();
        let stage = SearchStage::new(search.clone(), Duration::from_secs(5));
        let tasks = vec![
            task("alpha"),
            task("fail one"),
            task("beta"),
            task("fail two"),
            task("gamma"),
        ];

        let outcome = stage
            .execute_all(&tasks, None, &ProgressReporter::silent())
            .await;

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.failed, 2);
        assert!(outcome.results.contains(&"summary of beta".to_string()));
        assert!(search.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_panic_and_timeout_are_isolated() {
        let stage = SearchStage::new(ScriptedSearch::new(), Duration::from_millis(200));
        let tasks = vec![task("alpha"), task("panic now"), task("slow one")];

        let outcome = stage
            .execute_all(&tasks, None, &ProgressReporter::silent())
            .await;

        assert_eq!(outcome.results, vec!["summary of alpha".to_string()]);
        assert_eq!(outcome.failed, 2);
    }

    #[tokio::test]
    async fn test_progress_ticks_per_task() {
        let stage = SearchStage::new(ScriptedSearch::new(), Duration::from_secs(5));
        let tasks = vec![task("alpha"), task("fail"), task("beta")];
        let (progress, mut rx) = ProgressReporter::channel();

        stage.execute_all(&tasks, None, &progress).await;
        drop(progress);

        let mut ticks = Vec::new();
        while let Some(status) = rx.recv().await {
            assert_eq!(status.status, StatusKind::Progress);
            ticks.push(status.message);
        }
        assert_eq!(
            ticks,
            vec![
                "Searching... 1/3 completed",
                "Searching... 2/3 completed",
                "Searching... 3/3 completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_no_tasks_yields_empty_outcome() {
        let stage = SearchStage::new(ScriptedSearch::new(), Duration::from_secs(5));
        let outcome = stage
            .execute_all(&[], None, &ProgressReporter::silent())
            .await;
        assert_eq!(outcome, SearchOutcome::default());
    }

    #[test]
    fn test_search_input_with_context() {
        let context = ClarificationContext::from_block("Answer 1: Europe").unwrap();
        let input = search_input(&task("AI policy"), Some(&context));
        assert!(input.starts_with("Search term: AI policy\nReason for searching: because"));
        assert!(input.contains("use these to focus the search):\nAnswer 1: Europe"));

        let bare = search_input(&task("AI policy"), None);
        assert!(bare.ends_with("Perform the search and summarize the results."));
    }
}
