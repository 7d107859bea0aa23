//! End-to-end tests for tailmark live in `tests/`.
//!
//! They drive real files through tailing, classification and action dispatch,
//! with a recording action standing in for mail delivery.
