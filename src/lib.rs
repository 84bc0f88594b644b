//! AI repository assistant: local clone management, Gemini chat, and
//! budget-bounded project context selection.
//!
//! The two core components live in [`selector`] (which project files are
//! worth sending to the model) and [`cache`] (persistent response cache keyed
//! by prompt + model). Everything else is orchestration around them.

pub mod cache;
pub mod config;
pub mod git_cmd;
pub mod llm;
pub mod prompt;
pub mod selector;
pub mod session;
pub mod state;
pub mod util;
