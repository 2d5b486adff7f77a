#![forbid(unsafe_code)]

//! Person form demo for the databind core.
//!
//! A name field and a gender dropdown are bound to a plain `Person` value.
//! UI events come from a script (or stdin) and are marshaled onto the UI
//! thread, which applies them one at a time.

pub mod app;
pub mod cli;
pub mod runner;
pub mod script;
