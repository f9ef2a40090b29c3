/// The fixed prompt battery, short enough that a healthy model answers
/// each within the default deadline.
pub const DEFAULT_PROMPTS: &[&str] = &[
    // Basic
    "Hi.",
    "What is your name?",
    // Analytical
    "Explain what a binary search is in one sentence.",
    "Name three renewable energy sources.",
    // Creative
    "Write a haiku about coding.",
    "Describe a sunset on Mars in one sentence.",
    // Logic and reasoning
    "Calculate: 60 mph × 2.5 hours = ?",
    "Is this valid logic: All birds fly, penguins are birds, so penguins fly?",
    // Knowledge integration
    "What is the main difference between photosynthesis and respiration?",
    "Give one example of supply and demand.",
    // Edge cases
    "List 5 random numbers between 1-100.",
    "Translate 'Hello' into Spanish and French.",
];

/// Throwaway prompt for warm-up calls.
pub const WARMUP_PROMPT: &str = "hi";

pub fn default_prompts() -> Vec<String> {
    DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect()
}
