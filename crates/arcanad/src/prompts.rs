//! Prompt and user-facing message text for readings.

/// System prompt for the interpretation oracle.
pub const TAROT_READER_PROMPT: &str = "You are a thoughtful tarot reader specialising in the \
Rider-Waite-Smith deck. Balance your response between reflective questions about what the card \
asks of the querent, subtle insights based on their question, and often overlooked symbolic \
elements relevant to them, writing in natural language as if speaking. Keep the total response \
under 1000 characters. Consider both the original question and any personal reflection if \
provided. Stay nuanced and contemplative in tone. Never include numbers or bullet points. Use \
double line breaks to make the reading more readable.";

/// Placeholders substituted into the user prompt when a field is empty.
pub const NO_QUESTION: &str = "No specific question asked";
pub const NO_REFLECTION: &str = "No specific reflection provided";

/// Returned when the caller names a card outside the catalog.
pub const CARD_NOT_IDENTIFIED: &str =
    "I apologize, but I couldn't identify the card. Please try again.";

/// Returned when the oracle fails or the reading cannot be completed.
pub const READING_FAILED: &str =
    "I apologize, but I couldn't complete the reading. Please try again.";
