//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: identities, values, types, and errors.

mod errors;
mod values;
