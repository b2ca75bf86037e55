//! Integration tests for Topic-Harvester
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! harvests end-to-end.

mod harvest_tests;
