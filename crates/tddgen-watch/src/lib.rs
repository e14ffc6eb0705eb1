//! tddgen-watch: Library for the intake folder watcher
//!
//! This crate provides:
//! - A non-recursive watcher that reports settled source documents
//! - The dispatch pipeline (extract, inject, delete) with retry bounds
//! - Process-based invocation of the `tddgen` injector

pub mod invoke;
pub mod pipeline;
pub mod watcher;

pub use invoke::{Injector, InvokeStatus, ProcessInjector};
pub use pipeline::{run, DocumentOpener, Outcome, PdfOpener, Pipeline, RetryPolicy};
pub use watcher::FileWatcher;
