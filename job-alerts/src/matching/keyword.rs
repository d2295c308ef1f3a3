//! Skill-overlap scorer used when no external scorer is plugged in.

use std::collections::HashSet;

use super::{Assessment, MatchScorer};
use crate::domain::{JobPosting, UserProfile};

/// Default match threshold in percent.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Bonus added when the job is in one of the user's preferred locations.
const LOCATION_BONUS: f64 = 10.0;

/// Scores a user by the share of the job's skills found in their profile.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    threshold: f64,
}

impl KeywordScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl MatchScorer for KeywordScorer {
    fn assess(&self, job: &JobPosting, user: &UserProfile) -> Assessment {
        // Ordered and deduplicated, so a repeated skill counts once.
        let mut seen = HashSet::new();
        let wanted: Vec<String> = job
            .skills
            .iter()
            .map(|s| normalize(s))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if wanted.is_empty() {
            return Assessment::rejected(0.0, "job lists no skills");
        }

        let have: HashSet<String> = user.skills.iter().map(|s| normalize(s)).collect();
        let overlap: Vec<&str> = wanted
            .iter()
            .filter(|s| have.contains(*s))
            .map(String::as_str)
            .collect();

        let mut score = (overlap.len() as f64 / wanted.len() as f64 * 100.0).round();
        let location_match = job.location.as_deref().is_some_and(|location| {
            user.preferred_locations
                .iter()
                .any(|p| normalize(p) == normalize(location))
        });
        if location_match && !overlap.is_empty() {
            score = (score + LOCATION_BONUS).min(100.0);
        }

        if overlap.is_empty() {
            return Assessment::rejected(score, "no overlapping skills");
        }

        let mut reason = format!("skills overlap: {}", overlap.join(", "));
        if location_match {
            reason.push_str("; preferred location");
        }

        if score >= self.threshold {
            Assessment::matched(score, reason)
        } else {
            Assessment::rejected(score, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobPosting {
        JobPosting::new("J1", "Engineer", "Acme").with_skills(["Rust", "SQL", "Docker", "AWS"])
    }

    #[test]
    fn test_overlap_above_threshold_matches() {
        let user = UserProfile::new("U1").with_skills(["rust", "sql", "python"]);
        let assessment = KeywordScorer::default().assess(&job(), &user);
        assert!(assessment.is_match);
        assert_eq!(assessment.score, 50.0);
        assert_eq!(assessment.reason, "skills overlap: rust, sql");
    }

    #[test]
    fn test_overlap_below_threshold_does_not_match() {
        let user = UserProfile::new("U2").with_skills(["rust"]);
        let assessment = KeywordScorer::default().assess(&job(), &user);
        assert!(!assessment.is_match);
        assert_eq!(assessment.score, 25.0);
    }

    #[test]
    fn test_location_bonus() {
        let job = job().with_location("Berlin");
        let user = UserProfile::new("U3")
            .with_skills(["rust"])
            .with_preferred_locations(["berlin"]);
        let assessment = KeywordScorer::new(30.0).assess(&job, &user);
        assert!(assessment.is_match);
        assert_eq!(assessment.score, 35.0);
        assert!(assessment.reason.ends_with("preferred location"));
    }

    #[test]
    fn test_repeated_job_skills_count_once() {
        let job = JobPosting::new("J3", "Engineer", "Acme").with_skills(["rust", "Rust ", "sql"]);
        let user = UserProfile::new("U4").with_skills(["rust"]);
        let assessment = KeywordScorer::default().assess(&job, &user);
        assert!(assessment.is_match);
        assert_eq!(assessment.score, 50.0);
        assert_eq!(assessment.reason, "skills overlap: rust");
    }

    #[test]
    fn test_job_without_skills_never_matches() {
        let job = JobPosting::new("J2", "Engineer", "Acme");
        let user = UserProfile::new("U1").with_skills(["rust"]);
        assert!(!KeywordScorer::new(0.0).assess(&job, &user).is_match);
    }
}
