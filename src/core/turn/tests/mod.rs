//! Coordinator-level tests: full turns, barge-in, supersession, teardown.

mod helpers;
