use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Candidate information used to fill application forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub resume_path: Option<String>,
    pub summary: String,
    pub skills: Vec<String>,
    pub years_experience: Option<u32>,
    pub expected_salary: Option<String>,
    pub notice_period: String,
    pub work_authorization: String,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            email: String::new(),
            phone: String::new(),
            location: String::new(),
            linkedin_url: None,
            github_url: None,
            portfolio_url: None,
            resume_path: None,
            summary: String::new(),
            skills: Vec::new(),
            years_experience: None,
            expected_salary: None,
            notice_period: "Immediate".to_string(),
            work_authorization: "Authorized".to_string(),
        }
    }
}

impl CandidateProfile {
    /// Flat field map adapters fill forms from. Absent values become empty strings.
    pub fn form_fields(&self) -> BTreeMap<String, String> {
        let mut names = self.full_name.split_whitespace();
        let first_name = names.next().unwrap_or_default().to_string();
        let last_name = names.collect::<Vec<_>>().join(" ");

        let optional = |v: &Option<String>| v.clone().unwrap_or_default();

        [
            ("full_name", self.full_name.clone()),
            ("first_name", first_name),
            ("last_name", last_name),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
            ("location", self.location.clone()),
            ("linkedin", optional(&self.linkedin_url)),
            ("github", optional(&self.github_url)),
            ("portfolio", optional(&self.portfolio_url)),
            ("resume", optional(&self.resume_path)),
            ("summary", self.summary.clone()),
            ("skills", self.skills.join(", ")),
            (
                "years_experience",
                self.years_experience.map(|y| y.to_string()).unwrap_or_default(),
            ),
            ("salary", optional(&self.expected_salary)),
            ("notice_period", self.notice_period.clone()),
            ("work_authorization", self.work_authorization.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_split_name_and_join_skills() {
        let profile = CandidateProfile {
            full_name: "Grace Brewster Hopper".to_string(),
            email: "grace@example.com".to_string(),
            skills: vec!["Rust".to_string(), "Python".to_string()],
            years_experience: Some(7),
            ..CandidateProfile::default()
        };

        let fields = profile.form_fields();
        assert_eq!(fields["first_name"], "Grace");
        assert_eq!(fields["last_name"], "Brewster Hopper");
        assert_eq!(fields["skills"], "Rust, Python");
        assert_eq!(fields["years_experience"], "7");
        assert_eq!(fields["github"], "");
        assert_eq!(fields["notice_period"], "Immediate");
    }

    #[test]
    fn test_single_word_name() {
        let profile = CandidateProfile {
            full_name: "Prince".to_string(),
            ..CandidateProfile::default()
        };
        let fields = profile.form_fields();
        assert_eq!(fields["first_name"], "Prince");
        assert_eq!(fields["last_name"], "");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let profile: CandidateProfile =
            serde_json::from_str(r#"{ "full_name": "Ada", "skills": ["ml"] }"#).unwrap();
        assert_eq!(profile.work_authorization, "Authorized");
        assert_eq!(profile.skills, vec!["ml"]);
    }
}
