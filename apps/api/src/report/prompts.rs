// Prompt constants and builders for report generation and follow-up chat.
// Reuses cross-cutting fragments from llm_client::prompts.

use chrono::{DateTime, Utc};

use crate::llm_client::prompts::{DATA_GROUNDING_INSTRUCTION, MARKDOWN_FORMAT_INSTRUCTION};
use crate::llm_client::ChatMessage;
use crate::models::profile::{or_unspecified, StudentProfile};

/// System prompt for report generation. `{format}` and `{grounding}` are filled in.
const REPORT_SYSTEM_TEMPLATE: &str = "You are an experienced, human-like career counselor. \
    Write a concise, well-structured and in-depth report for the student described below. \
    Avoid repetition and focus on specific, data-driven insights: market trends, salary \
    projections and success rates. Suggest courses with pros and cons and eligibility \
    thresholds, the most promising future jobs with growth figures, and a step-by-step \
    roadmap with timelines and free or paid resources. Use the get_top_nirf_colleges tool \
    to fetch the top NIRF-ranked colleges for the relevant category, filtered by the \
    student's preferred state when one is given, and get_market_trends for salary data. \
    Address the student by name and keep the tone encouraging.\n\n{format}\n\n{grounding}";

/// Student details block. Every `{field}` placeholder is replaced before sending.
const REPORT_USER_TEMPLATE: &str = "Student's details:
- Name: {name}
- Age: {age}
- Grade/Year: {grade}
- School/Institution: {school}
- Skills: {skills}
- Interests: {interests}
- Passions: {passions}
- Career Goals: {goals}
- Academic Performance: {marks}
- Exam Scores: JEE - {jee}, NEET - {neet}, SAT - {sat}, Boards - {boards}
- Preferred Career Fields: {fields}
- Preferred Location/State: {location}

Generate the report in structured markdown with deep analysis and personalized motivation.";

const CHAT_SYSTEM_TEMPLATE: &str = "You are a professional career counselor assistant. \
    Use the following career report to answer the student's questions accurately and helpfully:

{report}

Instructions:
- Give specific, actionable career advice based on the report
- Be encouraging and supportive
- Reference specific details from the report when relevant
- Keep responses concise but informative (max 300 words)
- If asked about details not in the report, say that you need more information
- Current date: {now}";

/// Seeds the report conversation: system instructions plus the serialized profile.
pub fn build_report_messages(profile: &StudentProfile) -> Vec<ChatMessage> {
    let system = REPORT_SYSTEM_TEMPLATE
        .replace("{format}", MARKDOWN_FORMAT_INSTRUCTION)
        .replace("{grounding}", DATA_GROUNDING_INSTRUCTION);

    let exams = &profile.exams;
    let user = REPORT_USER_TEMPLATE
        .replace("{name}", profile.name.trim())
        .replace(
            "{age}",
            &profile
                .age
                .map(|a| format!("{a} years"))
                .unwrap_or_else(|| "Not specified".to_string()),
        )
        .replace("{grade}", or_unspecified(&profile.grade))
        .replace("{school}", or_unspecified(&profile.school))
        .replace("{skills}", &profile.skills.join(", "))
        .replace("{interests}", &profile.interests.join(", "))
        .replace("{passions}", or_unspecified(&profile.passions))
        .replace("{goals}", profile.goals.trim())
        .replace("{marks}", or_unspecified(&profile.marks))
        .replace("{jee}", or_unspecified(&exams.jee))
        .replace("{neet}", or_unspecified(&exams.neet))
        .replace("{sat}", or_unspecified(&exams.sat))
        .replace("{boards}", or_unspecified(&exams.boards))
        .replace("{fields}", &profile.preferred_fields.join(", "))
        .replace(
            "{location}",
            profile
                .location
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or("Any (India-wide)"),
        );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Builds a single-turn chat grounded in the text of a finished report.
pub fn build_chat_messages(report_text: &str, question: &str, now: DateTime<Utc>) -> Vec<ChatMessage> {
    let system = CHAT_SYSTEM_TEMPLATE
        .replace("{report}", report_text.trim())
        .replace("{now}", &now.format("%Y-%m-%d %H:%M UTC").to_string());

    vec![ChatMessage::system(system), ChatMessage::user(question.trim())]
}
