//! Test-environment provisioning for services backed by a message broker.
//!
//! Integration tests for a broker-backed service need two things before any
//! test body runs: the service-under-test must receive connection credentials
//! for the broker through its process environment, and the broker test double
//! must be up before client code under test touches it.
//!
//! This crate provides both halves as composable pieces:
//! - [`secdist`] builds the credential bundle and its canonical JSON form.
//! - [`env`] publishes the serialized bundle as a process environment map
//!   for an external launcher to apply.
//! - [`fixture`] is a small dependency-ordered fixture harness: named setup
//!   units with declared `requires` edges, resolved depth-first with
//!   per-scope memoization.
//! - [`rabbitmq`] wires the standard broker fixture set together.
//!
//! The broker test double itself, the service launcher, and the broker client
//! library are external collaborators; this crate only defines what a test
//! run injects and in what order fixtures must resolve.

#![deny(clippy::unwrap_used)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod env;
pub mod ext;
pub mod fixture;
pub mod rabbitmq;
pub mod secdist;
