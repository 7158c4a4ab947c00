//! Core library for the sheet-reconcile command line application.
//!
//! The library copies data from a source worksheet into the column layout of
//! a template worksheet. Column pairs are resolved by the cascade in
//! [`reconcile::mapping`] (explicit rules, synonym dictionary, fuzzy header
//! similarity), rows are transferred by [`reconcile::copy`], and the result is
//! post-processed by [`reconcile::substitute`] and [`reconcile::geocode`].
//! Workbook IO lives under [`reconcile::io`] and the end-to-end orchestration
//! in [`reconcile::run`].

pub mod reconcile;

pub use reconcile::{
    ReconcileError, Result, config, copy, dictionary, error, fuzzy, geocode, io, mapping, model,
    normalize, progress, run, substitute,
};
