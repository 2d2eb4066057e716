//! Cross-crate integration tests

#[cfg(test)]
mod voice_focus_integration;
