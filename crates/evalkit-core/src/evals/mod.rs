//! Concrete evals built on [`crate::eval::Session`].

pub mod hello;
