//! Tests for the broker test-environment harness.
//!
//! Some of these tests assert the exact serialized form of the published
//! environment variable. That form is a contract with the service-under-test,
//! so any change to it must be intentional.

mod secdist;
