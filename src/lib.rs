// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # terms-engine
//!
//! A forward-chaining inference engine over a typed, nested fact base.
//!
//! ## Architecture
//!
//! - **Lexicon** (`lexicon`): terms, the type lattice (petgraph) and variable tokens
//! - **Fact store** (`factset`): a discrimination trie keyed by predicate paths
//! - **Rule network** (`network`): premise trie, join indexes, guards and the
//!   assertion pipeline
//! - **Truth maintenance** (`tms`): Ancestor records that drive cascading retraction
//! - **Storage** (`store`): snapshots committed to redb or held in a DashMap
//!
//! ## Library usage
//!
//! ```no_run
//! use terms_engine::engine::Engine;
//! use terms_engine::predicate::Predicate;
//!
//! let engine = Engine::in_memory().unwrap();
//! engine.define_type("person", &["thing"], &[]).unwrap();
//! let john = engine.define_instance("john", "person").unwrap();
//! let sings = engine.define_type("sings", &["exists"], &[]).unwrap();
//! engine.add_fact(Predicate::new(sings).arg("subj", john)).unwrap();
//! ```

pub mod arena;
pub mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod factset;
pub mod lexicon;
pub mod network;
pub mod path;
pub mod predicate;
pub mod program;
pub mod provenance;
pub mod store;
pub mod tms;
