//! DSL (Domain Specific Language) for INDIGO driver definitions.
//!
//! A definition file describes one driver: its metadata, transports, the
//! devices it exposes, their properties and items, and blocks of C code
//! attached to well-known points of the generated driver. Attribute values
//! are C expressions copied verbatim into the output.
//!
//! # Grammar Overview
//!
//! ```text
//! definition   = "driver" IDENT "{" { driver_attr | device_block } "}"
//! driver_attr  = ("label" | "author" | "copyright") "=" STRING ";"
//!              | "version" "=" NUMBER ";"
//!              | "serial" "{" { serial_attr } "}"
//!              | "libusb" "{" { usb_attr } "}"
//!              | driver_role "{" CODE "}"
//!              | IDENT "=" EXPRESSION ";"
//! serial_attr  = "configurable_speed" "=" bool ";"
//!              | "pattern" "{" { pattern_attr } "}"
//! pattern_attr = ("product_id" | "vendor_id" | "product_string"
//!                | "vendor_string" | "serial_string") "=" EXPRESSION ";"
//!              | "exact_match" "=" bool ";"
//! usb_attr     = "hotplug" "=" bool ";"
//!              | ("vendor_id" | "product_id") "=" EXPRESSION ";"
//! device_block = device_kind ( "{" { device_attr | property } "}" | ";" )
//! device_attr  = ("name" | "interface") "=" EXPRESSION ";"
//!              | "additional_instances" "=" bool ";"
//!              | device_role "{" CODE "}"
//! property     = property_kind IDENT ( "{" { property_attr | item } "}" | ";" )
//! property_attr = ("label" | "handle" | "name" | "handler" | "hidden" | "perm"
//!                 | "rule" | "group" | "pointer") "=" EXPRESSION ";"
//!              | ("handle_change" | "asynchronous_change" | "persistent"
//!                 | "preserve_values" | "always_defined") "=" bool ";"
//!              | property_role "{" CODE "}"
//! item         = "item" IDENT ( "{" { item_attr } "}" | ";" )
//! item_attr    = ("label" | "handle" | "name" | "value" | "min" | "max"
//!                 | "step" | "format") "=" EXPRESSION ";"
//!
//! device_kind  = "ccd" | "wheel" | "focuser" | "mount" | "guider"
//!              | "rotator" | "dome" | "gps" | "ao" | "aux"
//! property_kind = "text" | "number" | "switch" | "light" | "inherited"
//! driver_role  = "include" | "define" | "data" | "code" | "on_init" | "on_shutdown"
//! device_role  = "code" | "on_timer" | "on_attach" | "on_connect"
//!              | "on_disconnect" | "on_detach"
//! property_role = "code" | "on_attach" | "on_change" | "on_detach"
//! bool         = "true" | "false"
//! ```
//!
//! `//` comments are skipped; comments starting with `// TODO:` are kept and
//! replayed at the top of the generated source.
//!
//! # Example
//!
//! ```text
//! driver upb {
//!     label = "Ultimate Powerbox";
//!     author = "Jane Doe";
//!     version = 1;
//!     serial {
//!         configurable_speed = true;
//!     }
//!     aux {
//!         interface = INDIGO_INTERFACE_AUX_POWERBOX;
//!         switch power_outlet {
//!             persistent = true;
//!             item outlet_1 { label = "Outlet #1"; value = true; }
//!             on_change {
//!                 upb_command(device, "P1:%d", OUTLET_1_ITEM->sw.value);
//!             }
//!         }
//!     }
//! }
//! ```

mod ast;
mod lexer;
mod parser;
mod printer;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind, TODO_MARKER};
pub use parser::Parser;
pub use printer::print;

use crate::error::{GeneratorError, Result};

/// Parse a driver definition string into an AST.
pub fn parse(input: &str) -> Result<Driver> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a driver definition file.
pub fn parse_file(path: &std::path::Path) -> Result<Driver> {
    let content = std::fs::read_to_string(path).map_err(|e| GeneratorError::read(path, e))?;
    parse(&content)
}
