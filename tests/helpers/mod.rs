//! Shared test fixtures.

#![allow(dead_code)]

pub mod source_fixtures;
pub mod workspace;
