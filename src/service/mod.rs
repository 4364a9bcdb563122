pub mod excuse;
pub mod intent;
pub mod reply;

/// `prompt_used` of a response that did not come from the model.
pub const FALLBACK_PROMPT: &str = "fallback";
