//! Cross-module scenario tests

mod decay_scenarios;
