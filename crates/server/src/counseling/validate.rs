use shared::{
    CreateCategoryRequest, CreateMessageRequest, CreateSessionRequest, MessageListQuery,
    MessageType, SessionListQuery, UpdateSessionRequest, MAX_PAGE_LIMIT,
};

use crate::validation::{self, ValidationError};

const MAX_CATEGORY_NAME: usize = 100;
const MAX_CATEGORY_DESCRIPTION: usize = 500;
const MAX_CATEGORY_ICON: usize = 50;
const MAX_CATEGORY_QUESTIONS: usize = 10;
const MAX_SESSION_TITLE: usize = 200;
const MAX_SESSION_SUMMARY: usize = 1000;
const MAX_MESSAGE_CONTENT: usize = 5000;

pub fn create_category(req: &CreateCategoryRequest) -> Result<(), ValidationError> {
    validation::require_text("name", &req.name, MAX_CATEGORY_NAME)?;
    if let Some(description) = &req.description {
        validation::max_chars("description", description, MAX_CATEGORY_DESCRIPTION)?;
    }
    if let Some(icon) = &req.icon {
        validation::max_chars("icon", icon, MAX_CATEGORY_ICON)?;
    }
    if let Some(color) = &req.color {
        validation::hex_color("color", color)?;
    }
    if req.initial_questions.len() > MAX_CATEGORY_QUESTIONS {
        return Err(ValidationError::TooMany {
            field: "initialQuestions",
            max: MAX_CATEGORY_QUESTIONS,
        });
    }
    for question in &req.initial_questions {
        if question.id.is_empty() {
            return Err(ValidationError::Empty { field: "initialQuestions.id" });
        }
        if question.text.is_empty() {
            return Err(ValidationError::Empty { field: "initialQuestions.text" });
        }
    }
    Ok(())
}

pub fn create_session(req: &CreateSessionRequest) -> Result<(), ValidationError> {
    validation::require_text("title", &req.title, MAX_SESSION_TITLE)?;
    if req.initial_responses.values().any(|r| r.question_id.is_empty()) {
        return Err(ValidationError::Empty {
            field: "initialResponses.questionId",
        });
    }
    Ok(())
}

pub fn update_session(req: &UpdateSessionRequest) -> Result<(), ValidationError> {
    if let Some(title) = &req.title {
        validation::require_text("title", title, MAX_SESSION_TITLE)?;
    }
    if let Some(summary) = &req.summary {
        validation::max_chars("summary", summary, MAX_SESSION_SUMMARY)?;
    }
    if let Some(thumbnail) = &req.thumbnail {
        validation::url("thumbnail", thumbnail)?;
    }
    Ok(())
}

pub fn create_message(req: &CreateMessageRequest) -> Result<(), ValidationError> {
    validation::require_text("content", &req.content, MAX_MESSAGE_CONTENT)?;
    if req.message_type == MessageType::System {
        return Err(ValidationError::InvalidFormat {
            field: "messageType",
            reason: "system messages cannot be posted",
        });
    }
    Ok(())
}

pub fn session_list_query(query: &SessionListQuery) -> Result<(), ValidationError> {
    validation::in_range("limit", query.limit(), 1, MAX_PAGE_LIMIT)
}

pub fn message_list_query(query: &MessageListQuery) -> Result<(), ValidationError> {
    validation::in_range("limit", query.limit(), 1, MAX_PAGE_LIMIT)
}
