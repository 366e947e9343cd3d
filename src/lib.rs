//! # Advisor KB
//!
//! Document ingestion and retrieval-augmented chat backend for a
//! college-counseling client portal.
//!
//! Counselors upload reference material (handbooks, recorded-session
//! transcripts, policy PDFs); the pipeline extracts text, chunks it on
//! sentence boundaries, embeds each chunk, and upserts the vectors into an
//! index. Students ask questions through a chat endpoint whose answers are
//! grounded strictly in the retrieved chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌─────────┐
//! │ Uploads  │──▶│     Pipeline      │──▶│ Vector  │
//! │ txt/pdf/ │   │ Extract+Chunk+    │   │  Index  │
//! │ docx/... │   │     Embed         │   └────┬────┘
//! └──────────┘   └───────────────────┘        │
//!       │                                     ▼
//!       ▼                               ┌──────────┐
//! ┌──────────┐                          │   Chat   │
//! │  SQLite  │◀─── status / records ───│ Responder │
//! │ registry │                          └──────────┘
//! └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! akb init                          # create database
//! akb ingest ./handbook.pdf         # upload and process a document
//! akb documents list                # see processing status
//! akb chat "When is the FAFSA due?" # ask a grounded question
//! akb serve api                     # start the portal HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction |
//! | [`chunk`] | Sentence-boundary chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index client (Qdrant / in-memory) |
//! | [`registry`] | Document and user record store |
//! | [`ingest`] | Ingestion pipeline and background queue |
//! | [`chat`] | Retrieval-grounded chat responder |
//! | [`auth`] | Signed session cookies and roles |
//! | [`server`] | Portal HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod auth;
pub mod chat;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod registry;
pub mod server;
pub mod services;
pub mod storage;
