//! repo-assist: send files, folders and prompts to a hosted LLM
//!
//! Collects text files, assembles them into a bounded prompt, calls the model
//! and routes the response to stdout, a file, or a mirrored output tree.

pub mod assemble;
pub mod chat;
pub mod cli;
pub mod collect;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod model;
pub mod router;
pub mod utils;
