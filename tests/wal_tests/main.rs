//! Tests for the write-ahead log

mod recovery_tests;
