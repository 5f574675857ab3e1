//! Default counseling categories inserted by the migrations

use anyhow::Result;
use shared::{Question, QuestionType};

pub struct DefaultCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    /// JSON-encoded list of questions
    pub initial_questions: String,
}

fn question(id: &str, text: &str, question_type: QuestionType, options: &[&str], order: u32) -> Question {
    Question {
        id: id.to_string(),
        text: text.to_string(),
        question_type,
        options: if options.is_empty() {
            None
        } else {
            Some(options.iter().map(|o| o.to_string()).collect())
        },
        required: order == 0,
        order,
    }
}

pub fn default_categories() -> Result<Vec<DefaultCategory>> {
    let mood = question(
        "mood",
        "How would you rate your mood today?",
        QuestionType::Scale,
        &["1", "2", "3", "4", "5"],
        0,
    );

    Ok(vec![
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0001",
            name: "Career",
            description: "Work stress, job changes and professional growth",
            icon: "Briefcase",
            color: "#F59E0B",
            initial_questions: serde_json::to_string(&[
                mood.clone(),
                question(
                    "career_topic",
                    "What is on your mind about work?",
                    QuestionType::Select,
                    &["Workload", "Colleagues", "Next step", "Other"],
                    1,
                ),
            ])?,
        },
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0002",
            name: "Emotions",
            description: "Understanding and naming what you feel",
            icon: "Heart",
            color: "#EF4444",
            initial_questions: serde_json::to_string(&[
                mood.clone(),
                question(
                    "emotions_felt",
                    "Which emotions have you felt most this week?",
                    QuestionType::Multiselect,
                    &["Joy", "Sadness", "Anger", "Anxiety", "Calm"],
                    1,
                ),
            ])?,
        },
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0003",
            name: "Goals",
            description: "Setting intentions and following through",
            icon: "Target",
            color: "#10B981",
            initial_questions: serde_json::to_string(&[question(
                "goal",
                "What would you like to achieve?",
                QuestionType::Text,
                &[],
                0,
            )])?,
        },
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0004",
            name: "Mental Health",
            description: "Stress, anxiety, sleep and self-care",
            icon: "Brain",
            color: "#8B5CF6",
            initial_questions: serde_json::to_string(&[mood])?,
        },
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0005",
            name: "Relationships",
            description: "Family, friends and partners",
            icon: "Users",
            color: "#3B82F6",
            initial_questions: "[]".to_string(),
        },
        DefaultCategory {
            id: "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0006",
            name: "Study",
            description: "Learning, exams and focus",
            icon: "BookOpen",
            color: "#06B6D4",
            initial_questions: "[]".to_string(),
        },
    ])
}
