//! Cross-crate integration tests for Quadfilter

#[cfg(test)]
mod pipeline_integration;
