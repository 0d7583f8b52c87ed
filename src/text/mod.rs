// Text post-processing: display styling, field extraction, prompt
// assembly.

pub mod extract;
pub mod markdown;
pub mod prompt;
