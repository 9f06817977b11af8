#![doc = "witokit-core: parallel Wikipedia dump processing into a one-sentence-per-line corpus."]

//! Every command is the same shape: a [`contract::Task`] is fanned out over a
//! list of inputs by a [`dispatch::Dispatcher`], each task writes its own file
//! in a tmp [`workspace::Workspace`], and [`aggregate::aggregate`] merges those
//! files in natural order into the final output.
//!
//! The dump host, the XML reader and the tokenizer sit behind the traits in
//! [`contract`]; [`wiki`] and [`tokenizer`] hold the default implementations.

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod natsort;
pub mod pipeline;
pub mod progress;
pub mod sample;
pub mod segment;
pub mod tasks;
pub mod tokenizer;
pub mod wiki;
pub mod workspace;
