//! Built-in response templates
//!
//! Templates use handlebars placeholders filled from the detected intent's
//! entities. The `default` pool carries no placeholders so it can always
//! render, including as the fallback when an entity is missing.

/// Intent name used when no templates exist for the detected intent
pub const DEFAULT_INTENT: &str = "default";

/// The built-in template pools, in (intent, templates) form
pub fn default_templates() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            "time.query",
            vec![
                "It's {{current_time}}.",
                "The current time is {{current_time}}.",
                "Right now it's {{current_time}}.",
            ],
        ),
        (
            "date.query",
            vec![
                "Today is {{weekday}}, {{formatted_date}}.",
                "It's {{weekday}}, {{formatted_date}}.",
                "The date is {{formatted_date}}.",
            ],
        ),
        (
            "greeting",
            vec![
                "Good {{time_of_day}}! How can I help you today?",
                "Hello! Hope you're having a good {{time_of_day}}.",
                "Hi there! How may I assist you this {{time_of_day}}?",
            ],
        ),
        (
            "farewell",
            vec![
                "Goodbye! Have a nice {{time_of_day}}.",
                "See you later! Enjoy your {{time_of_day}}.",
                "Bye for now! Take care.",
            ],
        ),
        (
            "help.request",
            vec![
                "I can help you with several things:\n- Checking the time and date\n- Basic conversation\n- Contacting your caregiver\n- Answering questions\nWhat would you like to know?",
                "Here's what I can do:\n- Tell you the time and date\n- Chat with you\n- Help you contact your caregiver\n- Answer your questions\nHow can I assist you?",
            ],
        ),
        (
            "caregiver.notify",
            vec![
                "I'll notify your {{role}} right away.",
                "I'm contacting your {{role}} now.",
                "I'll get your {{role}} for you immediately.",
            ],
        ),
        (
            "smalltalk.how_are_you",
            vec![
                "I'm doing well, thank you for asking! How can I help you today?",
                "I'm functioning perfectly! What can I do for you?",
                "All systems operational! How may I assist you?",
            ],
        ),
        (
            DEFAULT_INTENT,
            vec![
                "I'm not sure I understood that. Could you please rephrase?",
                "I didn't quite catch that. Can you say it another way?",
                "I'm still learning. Could you try asking in a different way?",
            ],
        ),
    ]
}
