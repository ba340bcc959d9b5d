#![doc = "bucket-backup-core: planning and execution logic for bucket-backup."]

//! This crate turns a set of backup profiles into `aws s3 sync` invocations
//! and supervises them one after another.
//!
//! # Usage
//! Load a [`config::ProfileSet`], pick a [`plan::RunMode`], and hand both to
//! [`backup::run_backup`] together with a [`contract::SyncExecutor`] such as
//! [`execute::ProcessExecutor`].

pub mod backup;
pub mod config;
pub mod contract;
pub mod execute;
pub mod plan;
