//! Settings strategies.
//!
//! A submission names its strategy via the `method` field; the submit
//! handler dispatches to the strategy claiming that method and leaves
//! the flow untouched otherwise. `profile` is the only strategy in this
//! service; login-adjacent strategies live behind the configured UI
//! URLs.

pub mod profile;
