// lib/src/ai/analysis.rs
//! Keyword-driven symptom triage. Deterministic, no model behind it.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Routine => "routine",
            Urgency::Soon => "soon",
            Urgency::Urgent => "urgent",
            Urgency::Emergency => "emergency",
        }
    }

    fn advice(&self) -> &'static str {
        match self {
            Urgency::Emergency => "Call emergency services or go to the nearest emergency department now.",
            Urgency::Urgent => "Seek care today, at an urgent care clinic or with an on-call doctor.",
            Urgency::Soon => "Book an appointment within the next few days.",
            Urgency::Routine => "Book a routine appointment if the symptoms persist.",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub urgency: Urgency,
    /// Keywords found in the text, in rule order.
    pub matched: Vec<String>,
    pub suggested_specialties: Vec<String>,
    pub advice: String,
}

struct Rule {
    keyword: &'static str,
    specialty: &'static str,
    urgency: Urgency,
}

const fn rule(keyword: &'static str, specialty: &'static str, urgency: Urgency) -> Rule {
    Rule { keyword, specialty, urgency }
}

const EMERGENCY_PHRASES: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "shortness of breath",
    "can't breathe",
    "unconscious",
    "severe bleeding",
    "stroke",
    "suicidal",
    "seizure",
];

const RULES: &[Rule] = &[
    rule("chest pain", "cardiology", Urgency::Emergency),
    rule("palpitations", "cardiology", Urgency::Urgent),
    rule("shortness of breath", "pulmonology", Urgency::Emergency),
    rule("cough", "general practice", Urgency::Routine),
    rule("wheez", "pulmonology", Urgency::Soon),
    rule("fever", "general practice", Urgency::Soon),
    rule("headache", "neurology", Urgency::Routine),
    rule("migraine", "neurology", Urgency::Soon),
    rule("numbness", "neurology", Urgency::Urgent),
    rule("seizure", "neurology", Urgency::Emergency),
    rule("rash", "dermatology", Urgency::Routine),
    rule("itch", "dermatology", Urgency::Routine),
    rule("stomach", "gastroenterology", Urgency::Routine),
    rule("vomit", "gastroenterology", Urgency::Soon),
    rule("diarrhea", "gastroenterology", Urgency::Soon),
    rule("joint pain", "rheumatology", Urgency::Routine),
    rule("back pain", "orthopedics", Urgency::Routine),
    rule("fracture", "orthopedics", Urgency::Urgent),
    rule("anxiety", "psychiatry", Urgency::Soon),
    rule("depress", "psychiatry", Urgency::Soon),
    rule("suicidal", "psychiatry", Urgency::Emergency),
    rule("ear", "otolaryngology", Urgency::Routine),
    rule("sore throat", "otolaryngology", Urgency::Routine),
    rule("blurred vision", "ophthalmology", Urgency::Urgent),
    rule("pregnan", "obstetrics", Urgency::Soon),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SymptomAnalyzer;

impl SymptomAnalyzer {
    pub fn new() -> Self {
        SymptomAnalyzer
    }

    pub fn analyze(&self, text: &str) -> AnalysisReport {
        let text = text.to_lowercase();
        let mut urgency = Urgency::Routine;
        let mut matched = Vec::new();
        let mut specialties: Vec<String> = Vec::new();

        for rule in RULES {
            if contains_word_prefix(&text, rule.keyword) {
                matched.push(rule.keyword.to_string());
                urgency = urgency.max(rule.urgency);
                if !specialties.iter().any(|s| s == rule.specialty) {
                    specialties.push(rule.specialty.to_string());
                }
            }
        }
        if EMERGENCY_PHRASES.iter().any(|p| text.contains(p)) {
            urgency = Urgency::Emergency;
        }
        if specialties.is_empty() {
            specialties.push("general practice".to_string());
        }
        AnalysisReport { urgency, matched, suggested_specialties: specialties, advice: urgency.advice().to_string() }
    }
}

/// `keyword` occurs at the start of a word, so "ear" matches "earache" but not "heart".
fn contains_word_prefix(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(i, _)| {
        text[..i].chars().next_back().is_none_or(|c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_phrases_win() {
        let report = SymptomAnalyzer::new().analyze("Mild rash and sudden CHEST PAIN since this morning");
        assert_eq!(report.urgency, Urgency::Emergency);
        assert_eq!(report.suggested_specialties, vec!["cardiology".to_string(), "dermatology".to_string()]);
        assert!(report.advice.contains("emergency"));
    }

    #[test]
    fn unknown_text_is_routine_general_practice() {
        let report = SymptomAnalyzer::new().analyze("I feel a bit off");
        assert_eq!(report.urgency, Urgency::Routine);
        assert!(report.matched.is_empty());
        assert_eq!(report.suggested_specialties, vec!["general practice".to_string()]);
    }

    #[test]
    fn keywords_match_word_starts_only() {
        let analyzer = SymptomAnalyzer::new();
        assert_eq!(analyzer.analyze("bad earache").matched, vec!["ear".to_string()]);
        assert!(analyzer.analyze("my heart is fine").matched.is_empty());
        assert_eq!(analyzer.analyze("fever and vomiting").urgency, Urgency::Soon);
    }
}
