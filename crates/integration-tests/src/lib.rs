//! End-to-end tests for Kashaaf live under `tests/`; this crate exports nothing.
