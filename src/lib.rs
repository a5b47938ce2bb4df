//! # EquityTool
//!
//! A research assistant that answers questions about content you load:
//! a PDF, CSV or text file, up to three web articles, or pasted text.
//!
//! The whole loaded corpus is sent with every question to a hosted language
//! model (Gemini or OpenAI-compatible), which answers in English.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Extractors   │──▶│   Corpus    │──▶│  QaEngine   │──▶ LanguageModel
//! │ PDF/CSV/TXT   │   │  (Session)  │   │ full prompt │
//! │ Web articles  │   └──────┬──────┘   └─────────────┘
//! └───────────────┘          │
//!                            ▼
//!                   ┌──────────────────┐   ┌──────────────┐
//!                   │ ConversationLog  │──▶│  PDF export  │
//!                   └──────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! eqt init                      # create the account database
//! eqt signup alice              # create an account
//! eqt chat --user alice         # interactive session
//! eqt ask --user alice --file q3.pdf "What was revenue?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF, CSV and TXT text extraction |
//! | [`fetch`] | Web article fetching |
//! | [`corpus`] | The loaded corpus and its loaders |
//! | [`stats`] | Character and word counts |
//! | [`conversation`] | Message log |
//! | [`llm`] | Gemini and OpenAI clients |
//! | [`qa`] | Prompt construction and question answering |
//! | [`session`] | Per-user session state |
//! | [`export`] | PDF transcript export |
//! | [`auth`] | SQLite + bcrypt credential store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`chat`] | Interactive chat loop and one-shot ask |

pub mod account;
pub mod auth;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod db;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod qa;
pub mod session;
pub mod stats;
pub mod traits;
