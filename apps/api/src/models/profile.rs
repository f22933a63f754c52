use serde::{Deserialize, Serialize};

use crate::errors::AppError;

const NOT_SPECIFIED: &str = "Not specified";

/// Entrance and board exam results as entered by the student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamScores {
    pub jee: Option<String>,
    pub neet: Option<String>,
    pub sat: Option<String>,
    pub boards: Option<String>,
}

/// Everything the client collects about a student before a report is generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub age: Option<u8>,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub passions: Option<String>,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub preferred_fields: Vec<String>,
    pub marks: Option<String>,
    #[serde(default)]
    pub exams: ExamScores,
}

impl StudentProfile {
    /// Rejects profiles the report prompt cannot be built from.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.goals.trim().is_empty() {
            return Err(AppError::Validation("goals is required".to_string()));
        }
        for (field, values) in [
            ("skills", &self.skills),
            ("interests", &self.interests),
            ("preferred_fields", &self.preferred_fields),
        ] {
            if values.iter().all(|v| v.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "{field} must contain at least one entry"
                )));
            }
        }
        Ok(())
    }

    /// Plain-text summary used when a report's PDF text cannot be recovered.
    pub fn summary(&self) -> String {
        let age = self
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let exams = [
            ("JEE", &self.exams.jee),
            ("NEET", &self.exams.neet),
            ("SAT", &self.exams.sat),
            ("Boards", &self.exams.boards),
        ]
        .iter()
        .filter_map(|(label, score)| score.as_deref().map(|s| format!("{label} {s}")))
        .collect::<Vec<_>>();

        format!(
            "Student Name: {}\nAge: {}\nGrade: {}\nSchool: {}\nLocation: {}\nSkills: {}\n\
             Interests: {}\nCareer Goals: {}\nPreferred Fields: {}\nAcademic Performance: {}\n\
             Exam Scores: {}\nPassions: {}",
            self.name,
            age,
            or_unspecified(&self.grade),
            or_unspecified(&self.school),
            or_unspecified(&self.location),
            self.skills.join(", "),
            self.interests.join(", "),
            self.goals,
            self.preferred_fields.join(", "),
            or_unspecified(&self.marks),
            if exams.is_empty() {
                NOT_SPECIFIED.to_string()
            } else {
                exams.join(", ")
            },
            or_unspecified(&self.passions),
        )
    }
}

pub(crate) fn or_unspecified(value: &Option<String>) -> &str {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(NOT_SPECIFIED)
}
