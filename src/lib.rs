//! # INDIGO Generator
//!
//! A compiler for INDIGO driver definitions.
//!
//! This library provides:
//! - A small declarative DSL describing a driver, its devices and their
//!   properties, with opaque blocks of C code attached at fixed points
//! - A forward generator producing the driver's header, stand-alone main
//!   and implementation files
//! - A reverse extractor rebuilding the definition from an edited
//!   implementation file
//!
//! ## Architecture
//!
//! - [`dsl`] - Lexer, parser, AST and printer of the definition language
//! - [`codegen`] - C code generation
//! - [`extract`] - Line scanner recovering a definition from generated C
//! - [`command`] - Mode resolution and file handling for the CLI
//!
//! ## Usage
//!
//! ```bash
//! # generate indigo_aux_upb.{h,c} and indigo_aux_upb_main.c
//! indigo_generator indigo_aux_upb.driver
//!
//! # carry edits of the generated source back into the definition
//! indigo_generator indigo_aux_upb.c
//!
//! # write a new definition from an existing generated driver
//! indigo_generator --create indigo_aux_upb.c
//! ```
//!
//! ## Code relocation
//!
//! Every code block of a definition is copied verbatim into the generated
//! implementation between `//+ path` and `//- path` comments, for example
//! `//+ aux.POWER.on_change`. Code edited between the markers survives an
//! extract and regenerate cycle.

pub mod codegen;
pub mod command;
pub mod dsl;
pub mod error;
pub mod extract;

#[cfg(feature = "cli")]
pub mod logging;

// Re-export main types for convenience
pub use command::Command;
pub use dsl::Driver;
pub use error::{GeneratorError, Result};
