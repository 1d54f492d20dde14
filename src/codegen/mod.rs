//! Forward code generator.
//!
//! Turns a parsed [`Driver`] into the three C files of an INDIGO driver:
//!
//! - `indigo_<type>_<name>.h`: entry point declaration
//! - `indigo_<type>_<name>_main.c`: stand-alone executable wrapper
//! - `indigo_<type>_<name>.c`: the driver implementation
//!
//! Generation is a pure function of the AST. Every code block is relocated
//! between `//+ path` and `//- path` marker comments, which the
//! [`extract`](crate::extract) module keys on to rebuild the definition.

mod device;
mod header;
mod hotplug;
mod main_stub;
mod source;
pub mod writer;

use log::debug;

use crate::dsl::Driver;
use writer::SourceWriter;

/// Options for a generator run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// File name quoted in the "generated from" comment
    pub source_name: String,
}

impl GenerateOptions {
    /// Options for a definition at its conventional file name.
    pub fn for_driver(driver: &Driver) -> Self {
        Self {
            source_name: format!("{}.driver", driver.base_name()),
        }
    }
}

/// The generated files of one driver, held in memory until all of them
/// are complete.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDriver {
    /// Common file name stem, e.g. `indigo_aux_upb`
    pub base_name: String,
    pub header: String,
    pub main: String,
    pub source: String,
}

impl GeneratedDriver {
    /// File names paired with their contents.
    pub fn files(&self) -> [(String, &str); 3] {
        [
            (format!("{}.h", self.base_name), self.header.as_str()),
            (format!("{}_main.c", self.base_name), self.main.as_str()),
            (format!("{}.c", self.base_name), self.source.as_str()),
        ]
    }
}

/// Generate all files of a driver.
pub fn generate(driver: &Driver, options: &GenerateOptions) -> GeneratedDriver {
    let generated = GeneratedDriver {
        base_name: driver.base_name(),
        header: header::generate(driver, &options.source_name),
        main: main_stub::generate(driver, &options.source_name),
        source: source::generate(driver, &options.source_name),
    };
    debug!(
        "generated {}: header {} bytes, main {} bytes, source {} bytes",
        generated.base_name,
        generated.header.len(),
        generated.main.len(),
        generated.source.len()
    );
    generated
}

const LICENSE: &[&str] = &[
    "All rights reserved.",
    "",
    "You can use this software under the terms of 'INDIGO Astronomy",
    "open-source license' (see LICENSE.md).",
    "",
    "THIS SOFTWARE IS PROVIDED BY THE AUTHORS 'AS IS' AND ANY EXPRESS",
    "OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE IMPLIED",
    "WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE",
    "ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR ANY",
    "DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL",
    "DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE",
    "GOODS OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS",
    "INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,",
    "WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING",
    "NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS",
    "SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.",
];

/// Prefix of the comment naming the definition a file was generated from.
pub const GENERATED_FROM: &str = "// This file generated from ";

/// Copyright and license comment shared by all generated files.
fn preamble(w: &mut SourceWriter, driver: &Driver, source_name: &str) {
    w.line(format!("// {}", driver.copyright).trim_end());
    for line in LICENSE {
        w.line(format!("// {}", line).trim_end());
    }
    w.blank();
    w.line(format!("{}{}", GENERATED_FROM, source_name));
    w.blank();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn test_file_names() {
        let driver = parse("driver upb { aux; }").unwrap();
        let generated = generate(&driver, &GenerateOptions::for_driver(&driver));
        let names: Vec<String> = generated.files().iter().map(|(name, _)| name.clone()).collect();
        assert_eq!(names, ["indigo_aux_upb.h", "indigo_aux_upb_main.c", "indigo_aux_upb.c"]);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let driver = parse(
            "driver upb {
                serial { pattern { product_string = \"UPB\"; } }
                aux {
                    on_timer { indigo_execute_handler_in(device, 1, aux_timer_callback); }
                    switch power { persistent = true; item on; item off; }
                    number level { item value { max = 10; } }
                }
                focuser {
                    inherited FOCUSER_POSITION { on_change { x(); } }
                }
            }",
        )
        .unwrap();
        let options = GenerateOptions::for_driver(&driver);
        assert_eq!(generate(&driver, &options), generate(&driver, &options));
    }

    #[test]
    fn test_preamble() {
        let mut driver = parse("driver foo { copyright = \"Copyright (c) 2025 Jane Doe\"; ccd; }").unwrap();
        let mut w = SourceWriter::new();
        preamble(&mut w, &driver, "indigo_ccd_foo.driver");
        let text = w.finish();
        assert!(text.starts_with("// Copyright (c) 2025 Jane Doe\n// All rights reserved.\n\n// You can use"));
        assert!(text.ends_with("\n\n// This file generated from indigo_ccd_foo.driver\n\n"));

        driver.copyright.clear();
        let mut w = SourceWriter::new();
        preamble(&mut w, &driver, "x.driver");
        assert!(w.finish().starts_with("//\n// All rights reserved.\n"));
    }
}
