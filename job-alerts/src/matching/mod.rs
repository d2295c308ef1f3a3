//! Match evaluation.
//!
//! Runs a [`MatchScorer`] over every user profile for one job posting and
//! collects one [`MatchResult`] per user. Evaluation performs no I/O.

mod keyword;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{JobPosting, UserProfile};

pub use keyword::{DEFAULT_THRESHOLD, KeywordScorer};

/// Verdict of a scorer for a single (job, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub is_match: bool,
    pub score: f64,
    pub reason: String,
}

impl Assessment {
    pub fn matched(score: f64, reason: impl Into<String>) -> Self {
        Self {
            is_match: true,
            score,
            reason: reason.into(),
        }
    }

    pub fn rejected(score: f64, reason: impl Into<String>) -> Self {
        Self {
            is_match: false,
            score,
            reason: reason.into(),
        }
    }
}

/// Decides whether a job fits a user profile.
pub trait MatchScorer: Send + Sync {
    fn assess(&self, job: &JobPosting, user: &UserProfile) -> Assessment;
}

impl<F> MatchScorer for F
where
    F: Fn(&JobPosting, &UserProfile) -> Assessment + Send + Sync,
{
    fn assess(&self, job: &JobPosting, user: &UserProfile) -> Assessment {
        self(job, user)
    }
}

/// Per-user output of the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub user_id: String,
    pub is_match: bool,
    pub score: f64,
    pub reason: String,
}

/// Evaluates a job posting against a set of user profiles.
#[derive(Clone)]
pub struct MatchEvaluator {
    scorer: Arc<dyn MatchScorer>,
}

impl MatchEvaluator {
    pub fn new(scorer: Arc<dyn MatchScorer>) -> Self {
        Self { scorer }
    }

    /// One verdict per user, in input order. Every user is assessed.
    pub fn evaluate(&self, job: &JobPosting, users: &[UserProfile]) -> Vec<MatchResult> {
        let results: Vec<MatchResult> = users
            .iter()
            .map(|user| {
                let assessment = self.scorer.assess(job, user);
                MatchResult {
                    user_id: user.id.clone(),
                    is_match: assessment.is_match,
                    score: assessment.score,
                    reason: assessment.reason,
                }
            })
            .collect();

        debug!(
            job_id = %job.id,
            users = users.len(),
            matches = results.iter().filter(|r| r.is_match).count(),
            "Evaluated job posting"
        );

        results
    }

    /// Only the verdicts that matched.
    pub fn matches(&self, job: &JobPosting, users: &[UserProfile]) -> Vec<MatchResult> {
        self.evaluate(job, users)
            .into_iter()
            .filter(|r| r.is_match)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_every_user_gets_a_verdict() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let scorer = move |_job: &JobPosting, user: &UserProfile| {
            counter.fetch_add(1, Ordering::SeqCst);
            if user.id == "U1" {
                Assessment::matched(82.0, "skills overlap")
            } else {
                Assessment::rejected(10.0, "no overlap")
            }
        };
        let evaluator = MatchEvaluator::new(Arc::new(scorer));

        let job = JobPosting::new("J1", "Engineer", "Acme");
        let users = vec![UserProfile::new("U1"), UserProfile::new("U2")];

        let results = evaluator.evaluate(&job, &users);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].user_id, "U1");
        assert!(results[0].is_match);
        assert_eq!(results[0].score, 82.0);
        assert!(!results[1].is_match);

        let matches = evaluator.matches(&job, &users);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].reason, "skills overlap");
    }

    #[test]
    fn test_no_users_is_not_an_error() {
        let evaluator = MatchEvaluator::new(Arc::new(KeywordScorer::default()));
        let job = JobPosting::new("J1", "Engineer", "Acme");
        assert!(evaluator.evaluate(&job, &[]).is_empty());
    }
}
