//! Greeting classifier - keeps small talk away from retrieval and the model

/// Whole messages treated as conversational noise.
const GREETING_PHRASES: &[&str] = &[
    "hi", "hii", "hiii", "hey", "hello", "howdy", "sup", "yo",
    "good morning", "good afternoon", "good evening", "good night",
    "thanks", "thank you", "bye", "goodbye", "see you",
    "what's up", "whats up", "how are you", "who are you",
    "what can you do", "help",
];

/// Words that mark a short message as a greeting wherever they appear.
const GREETING_WORDS: &[&str] = &[
    "hi", "hii", "hiii", "hey", "hello", "howdy", "sup", "yo", "bye", "goodbye",
];

/// How a message was recognised as a greeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingMatch {
    /// The whole message is a known greeting phrase
    Exact,
    /// A short message contains a greeting word
    Fuzzy,
}

#[derive(Debug, Clone)]
pub struct GreetingClassifier {
    max_fuzzy_chars: usize,
    response: String,
}

impl GreetingClassifier {
    /// `max_fuzzy_chars`: inputs at or above this length only match exactly.
    pub fn new(max_fuzzy_chars: usize, document_name: &str) -> Self {
        Self {
            max_fuzzy_chars,
            response: format!(
                "Hi there! I'm the {doc} Clinical Knowledge Assistant. I can help you with \
                 questions about the {doc} guidelines. Feel free to ask about symptoms, \
                 referral criteria, investigations, or any topic covered by the guidelines.",
                doc = document_name
            ),
        }
    }

    pub fn classify(&self, text: &str) -> Option<GreetingMatch> {
        let normalized = normalize(text);

        if GREETING_PHRASES.contains(&normalized.as_str()) {
            return Some(GreetingMatch::Exact);
        }

        if normalized.chars().count() < self.max_fuzzy_chars
            && normalized
                .split_whitespace()
                .any(|token| GREETING_WORDS.contains(&token))
        {
            return Some(GreetingMatch::Fuzzy);
        }

        None
    }

    pub fn is_greeting(&self, text: &str) -> bool {
        self.classify(text).is_some()
    }

    /// Canned reply for any greeting
    pub fn response(&self) -> &str {
        &self.response
    }
}

fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(|c| matches!(c, '!' | '?' | '.' | ','))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GreetingClassifier {
        GreetingClassifier::new(60, "NG12")
    }

    #[test]
    fn test_exact_phrases() {
        let c = classifier();
        assert_eq!(c.classify("hello"), Some(GreetingMatch::Exact));
        assert_eq!(c.classify("  Good Morning!  "), Some(GreetingMatch::Exact));
        assert_eq!(c.classify("Thank you."), Some(GreetingMatch::Exact));
        assert_eq!(c.classify("how are you?"), Some(GreetingMatch::Exact));
    }

    #[test]
    fn test_fuzzy_short_messages() {
        let c = classifier();
        assert_eq!(c.classify("hii how are u"), Some(GreetingMatch::Fuzzy));
        assert_eq!(c.classify("hey there, doctor"), Some(GreetingMatch::Fuzzy));
    }

    #[test]
    fn test_long_messages_skip_fuzzy_path() {
        let c = classifier();
        let question =
            "hi, what are the referral criteria for suspected lung cancer in adults over 40?";
        assert!(question.len() >= 60);
        assert_eq!(c.classify(question), None);
    }

    #[test]
    fn test_clinical_questions_are_not_greetings() {
        let c = classifier();
        assert!(!c.is_greeting("When should haematuria be referred?"));
        assert!(!c.is_greeting("this is about history of cough"));
        assert!(!c.is_greeting(""));
    }

    #[test]
    fn test_cutoff_is_configurable() {
        let strict = GreetingClassifier::new(5, "NG12");
        assert!(!strict.is_greeting("hey doc"));
        assert!(strict.is_greeting("hello"));
    }

    #[test]
    fn test_response_names_document() {
        assert!(classifier().response().contains("NG12"));
    }
}
