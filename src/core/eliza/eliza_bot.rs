// Pattern-matching chatbot in the style of ELIZA.
//
// Rules are tried in order against the start of the input (case-insensitive).
// The first rule that matches picks a random template, and `%1`, `%2`, ... are
// replaced with the matching capture group after pronoun reflection
// ("my exams" becomes "your exams").

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

pub const GREETING: &str = "How do you do. Please tell me your problem.";
pub const FAREWELL: &str = "Goodbye. Thank you for talking to me.";
const FALLBACK: &str = "Please go on.";

/// User perspective -> bot perspective.
const REFLECTIONS: &[(&str, &str)] = &[
    ("am", "are"),
    ("was", "were"),
    ("i", "you"),
    ("i'd", "you would"),
    ("i've", "you have"),
    ("i'll", "you will"),
    ("my", "your"),
    ("you", "me"),
    ("you're", "I'm"),
    ("you've", "I've"),
    ("you'll", "I'll"),
    ("your", "my"),
    ("yours", "mine"),
    ("me", "you"),
];

const RULES: &[(&str, &[&str])] = &[
    (
        r".*\babout\b(.*)",
        &[
            "What about %1?",
            "How do you feel about %1?",
            "Why are you thinking about %1 right now?",
        ],
    ),
    (
        r"hi|hello|hey",
        &[
            "Hello. How are you feeling today?",
            "Hi there. What would you like to talk about?",
        ],
    ),
    (
        r"my name is (.*)",
        &["Nice to meet you, %1.", "Hello %1, how are you today?"],
    ),
    (
        r"i feel (.*)",
        &[
            "Why do you feel %1?",
            "Do you often feel %1?",
            "What makes you feel %1?",
        ],
    ),
    (
        r"i am (.*)",
        &["How long have you been %1?", "Why do you say you are %1?"],
    ),
    (
        r"(.*)mother(.*)",
        &[
            "Tell me more about your mother.",
            "How is your relationship with your mother?",
        ],
    ),
    (
        r"(.*)father(.*)",
        &[
            "Tell me more about your father.",
            "Do you get along with your father?",
        ],
    ),
    (
        r"(.*)because (.*)",
        &["Is that the real reason?", "What other reasons come to mind?"],
    ),
    (
        r"(.*)\?",
        &[
            "Why do you ask that?",
            "What do you think?",
            "How would you answer that yourself?",
        ],
    ),
    (
        r"(.*)",
        &[
            "Please tell me more.",
            "Can you elaborate on that?",
            "How does that make you feel?",
            "Let's talk more about that.",
        ],
    ),
];

struct Rule {
    pattern: Regex,
    responses: &'static [&'static str],
}

pub struct ElizaBot {
    rules: Vec<Rule>,
}

impl ElizaBot {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = RULES
            .iter()
            .map(|&(pattern, responses)| {
                Ok(Rule {
                    pattern: Regex::new(&format!("(?i)^(?:{})", pattern))?,
                    responses,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { rules })
    }

    pub fn respond(&self, text: &str) -> String {
        self.respond_with(&mut rand::thread_rng(), text)
    }

    pub fn respond_with<R: Rng + ?Sized>(&self, rng: &mut R, text: &str) -> String {
        let text = text.trim();

        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(text) else {
                continue;
            };
            let Some(template) = rule.responses.choose(rng) else {
                continue;
            };

            let mut response = template.to_string();
            for i in 1..captures.len() {
                let group = captures.get(i).map(|m| m.as_str()).unwrap_or("");
                response = response.replace(&format!("%{}", i), &reflect(group));
            }
            return response;
        }

        FALLBACK.to_string()
    }
}

/// Lower-cases the fragment and swaps first/second person words.
pub fn reflect(fragment: &str) -> String {
    fragment
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            REFLECTIONS
                .iter()
                .find(|(from, _)| *from == word)
                .map(|(_, to)| *to)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_farewell(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "quit" | "exit" | "bye")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reply(text: &str) -> String {
        let bot = ElizaBot::new().unwrap();
        bot.respond_with(&mut StdRng::seed_from_u64(7), text)
    }

    #[test]
    fn test_reflect_swaps_pronouns() {
        assert_eq!(reflect("I am sure you're right"), "you are sure I'm right");
        assert_eq!(reflect("  My   exams "), "your exams");
    }

    #[test]
    fn test_feelings_are_reflected_back() {
        let response = reply("I feel tired");
        assert!(
            [
                "Why do you feel tired?",
                "Do you often feel tired?",
                "What makes you feel tired?",
            ]
            .contains(&response.as_str()),
            "unexpected reply: {}",
            response
        );
    }

    #[test]
    fn test_about_rule_wins_over_later_rules() {
        let response = reply("I am worried about my exams");
        assert!(response.contains("your exams"), "unexpected reply: {}", response);
    }

    #[test]
    fn test_name_is_lowercased() {
        let response = reply("My name is Ada");
        assert!(
            response == "Nice to meet you, ada." || response == "Hello ada, how are you today?",
            "unexpected reply: {}",
            response
        );
    }

    #[test]
    fn test_greeting_is_case_insensitive() {
        let response = reply("HELLO there");
        assert!(response.starts_with("Hello.") || response.starts_with("Hi there."));
    }

    #[test]
    fn test_questions_get_deflected() {
        let response = reply("Is it raining?");
        assert!([
            "Why do you ask that?",
            "What do you think?",
            "How would you answer that yourself?",
        ]
        .contains(&response.as_str()));
    }

    #[test]
    fn test_catch_all_always_answers() {
        let response = reply("The weather is nice");
        assert!(!response.is_empty());
        assert_ne!(response, FALLBACK);
    }

    #[test]
    fn test_farewells() {
        assert!(is_farewell("Bye"));
        assert!(is_farewell(" quit "));
        assert!(!is_farewell("goodbye for now"));
    }
}
