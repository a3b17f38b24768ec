//! Integration test crate for the scrub render engine.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! They run real worker pools and scheduler threads together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod playback;

#[cfg(test)]
mod sync;
