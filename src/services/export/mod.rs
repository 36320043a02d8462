//! Export pipeline.
//!
//! [`ExportBatcher`] partitions closed time windows into work items;
//! [`ExportWorker`] turns claimed work items into published export files.
//! The two run as separate invocations and only meet through the
//! `export_batch` table.

mod batcher;
mod error;
mod planner;
mod window;
mod worker;

pub(crate) use batcher::ExportBatcher;
pub(crate) use error::ExportError;
pub(crate) use worker::ExportWorker;
