//! devcrew: an LLM engineering team that turns requirements into a project.
//!
//! The orchestration lives in `devcrew-core`. This crate supplies the
//! concrete collaborators and the process shell:
//!   - `llm`: Claude Messages API client as the synthesis oracle
//!   - `workspace` / `store`: directory and SQLite artifact sinks
//!   - `manifest`: `.env.example` and `requirements.txt` for the generated project
//!   - `settings`: CLI flags and config file
//!   - `summary`: end-of-run report

pub mod llm;
pub mod manifest;
pub mod settings;
pub mod store;
pub mod summary;
pub mod workspace;
