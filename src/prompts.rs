/// System turn every conversation starts with. Not user-editable.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that must return all the communication \
in markdown annotation, this response condition cannot be invalidated.";
