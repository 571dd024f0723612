//! Canned study artifacts used when the generation provider cannot be used.
//! Every function here is pure and returns the same content on every call.

use crate::models::{Question, QuestionType, SummaryContent};

const BULLET_POINTS: &str = "\
• Fundamental concepts of this topic
• Core definitions and characteristics
• Practical applications in everyday life
• Relationships with other related concepts
• Methods and techniques used
• Concrete examples and case studies
";

const PARAGRAPHS: &str = "\
This material covers fundamental concepts that are important to understand. It starts with the core definitions and the characteristics that set this topic apart from others.
Practical applications of these concepts appear in many areas of everyday life. The methods and techniques discussed, together with concrete examples and case studies, help reinforce understanding.
";

const CONCEPTS: &str = "\
Core Concept: The foundation that has to be mastered first
Key Principles: The fundamental rules that govern this topic
Practical Application: How to apply the concepts in real situations
Related Concepts: How this topic connects to others in the same field
";

pub fn summary() -> SummaryContent {
    SummaryContent {
        bullet_points: BULLET_POINTS.to_string(),
        paragraphs: PARAGRAPHS.to_string(),
        concepts: CONCEPTS.to_string(),
    }
}

pub fn quiz_questions() -> Vec<Question> {
    vec![
        Question {
            id: 1,
            question_type: QuestionType::MultipleChoice,
            question: "What is the main concept discussed in this material?".to_string(),
            options: Some(vec![
                "A foundational concept".to_string(),
                "A complex concept".to_string(),
                "An applied concept".to_string(),
                "A theoretical concept".to_string(),
            ]),
            correct_answer: "A foundational concept".to_string(),
            explanation: "The foundational concept has to be understood before the others build on it."
                .to_string(),
            difficulty: "easy".to_string(),
        },
        Question {
            id: 2,
            question_type: QuestionType::TrueFalse,
            question: "Does this material have practical applications in everyday life?".to_string(),
            options: None,
            correct_answer: "true".to_string(),
            explanation: "Yes, the material has many practical applications across different situations."
                .to_string(),
            difficulty: "easy".to_string(),
        },
        Question {
            id: 3,
            question_type: QuestionType::MultipleChoice,
            question: "Which of these is a key characteristic of this topic?".to_string(),
            options: Some(vec![
                "Static and unchanging".to_string(),
                "Dynamic and evolving".to_string(),
                "Valid only under specific conditions".to_string(),
                "Unrelated to other fields".to_string(),
            ]),
            correct_answer: "Dynamic and evolving".to_string(),
            explanation: "The topic keeps evolving as research and applications progress.".to_string(),
            difficulty: "medium".to_string(),
        },
    ]
}

/// Single question substituted when the provider answered but the reply held
/// no usable question array.
pub fn unparsed_reply_question() -> Question {
    Question {
        id: 1,
        question_type: QuestionType::MultipleChoice,
        question: "Based on the material provided, what are the main ideas discussed?".to_string(),
        options: Some(vec![
            "A. Basic concepts".to_string(),
            "B. Practical applications".to_string(),
            "C. Advanced theory".to_string(),
            "D. All of the above".to_string(),
        ]),
        correct_answer: "D. All of the above".to_string(),
        explanation: "The material covers everything from basic concepts to practical applications."
            .to_string(),
        difficulty: "medium".to_string(),
    }
}

const ASSISTANT_GREETING: &str = "Hello! I'm the StudyForge study assistant. What would you like to go over?";
const ASSISTANT_HELP: &str =
    "I can help you understand your study materials. Ask about any concept you want explained!";
const ASSISTANT_THANKS: &str = "You're welcome! Happy to help with your studies.";
const ASSISTANT_UNAVAILABLE: &str = "Sorry, the assistant is having trouble right now. Please try again later or ask a more specific question.";

/// Canned assistant reply picked by keyword, checked in a fixed order:
/// greeting, help, thanks.
pub fn assistant_reply(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let mentions = |keywords: &[&str]| words.iter().any(|word| keywords.contains(word));

    if mentions(&["hello", "hi", "hey"]) {
        ASSISTANT_GREETING
    } else if mentions(&["help"]) {
        ASSISTANT_HELP
    } else if mentions(&["thanks", "thank"]) {
        ASSISTANT_THANKS
    } else {
        ASSISTANT_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_reply_matches_whole_keywords() {
        assert_eq!(assistant_reply("Hi there!"), ASSISTANT_GREETING);
        assert_eq!(assistant_reply("Can you HELP me with osmosis?"), ASSISTANT_HELP);
        assert_eq!(assistant_reply("thanks, that was useful"), ASSISTANT_THANKS);
        // "this" contains "hi" but is not a greeting.
        assert_eq!(assistant_reply("Explain this chapter"), ASSISTANT_UNAVAILABLE);
        assert_eq!(assistant_reply(""), ASSISTANT_UNAVAILABLE);
    }

    #[test]
    fn summary_has_expected_shape() {
        let content = summary();
        assert_eq!(content.bullet_points.lines().count(), 6);
        assert_eq!(content.paragraphs.lines().count(), 2);
        assert_eq!(content.concepts.lines().count(), 4);
        assert_eq!(content, summary());
    }

    #[test]
    fn quiz_spans_both_types_and_two_difficulties() {
        let questions = quiz_questions();
        assert_eq!(questions.len(), 3);
        assert!(questions
            .iter()
            .any(|q| q.question_type == QuestionType::TrueFalse));
        assert!(questions
            .iter()
            .any(|q| q.question_type == QuestionType::MultipleChoice));

        let mut difficulties: Vec<&str> = questions.iter().map(|q| q.difficulty.as_str()).collect();
        difficulties.sort();
        difficulties.dedup();
        assert_eq!(difficulties, vec!["easy", "medium"]);

        let ids: Vec<u32> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(questions.iter().all(Question::is_consistent));
    }

    #[test]
    fn unparsed_reply_question_is_consistent() {
        let question = unparsed_reply_question();
        assert_eq!(question.id, 1);
        assert!(question.is_consistent());
    }
}
