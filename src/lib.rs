//! # Clausewise
//!
//! A local-first pipeline for explaining legal and government documents
//! in plain English.
//!
//! Clausewise ingests a user's document (PDF, DOCX, or plain text),
//! splits it into clauses along legal section boundaries, checks that it
//! actually is legal material, finds the clause most relevant to the
//! user's question, retrieves supporting references from a local
//! knowledge base of acts and regulations, and asks an LLM to explain
//! the document for an ordinary reader.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract+Chunk │──▶│    SQLite    │
//! │ pdf/docx │   │   +Classify   │   │  user docs   │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │
//! ┌──────────┐   ┌──────────────┐          ▼
//! │ KB corpus │──▶│ Embed+Index  │   ┌──────────────┐
//! │ acts/regs │   │  (flat L2)   │──▶│ RAG pipeline │──▶ answer
//! └──────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cw init                        # create database and data folders
//! cw kb rebuild                  # index the knowledge-base corpus
//! cw upload lease.pdf            # chunk and store a document
//! cw ask <doc-id> "Can my landlord raise the rent?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`chunk`] | Clause-boundary chunking |
//! | [`classify`] | Legal-document keyword gate |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat vector index with persistence |
//! | [`retrieve`] | Thresholded knowledge-base retrieval |
//! | [`generate`] | LLM generation with bounded retry |
//! | [`rag`] | End-to-end question answering |
//! | [`kb`] | Knowledge-base builds and status |
//! | [`store`] | SQLite store for uploaded documents |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index;
pub mod kb;
pub mod models;
pub mod rag;
pub mod retrieve;
pub mod store;
