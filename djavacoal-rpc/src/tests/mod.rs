//! Test module for djavacoal-rpc
//!
//! Unit and property-based tests for router composition, the context chain,
//! middleware scoping, validation, wire encoding, the cached client, and the
//! HTTP boundary.


#[cfg(test)]
pub mod middleware_tests;

#[cfg(test)]
pub mod context_tests;




#[cfg(test)]
pub mod serve_tests;
