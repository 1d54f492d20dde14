//! Indentation-aware text buffer used by all emitters.

use crate::dsl::CodePath;

/// Minimum column width of aligned `#define` names.
pub const DEFINE_WIDTH: usize = 20;

/// Tab-indented C source buffer.
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation. Empty lines carry no
    /// indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write a line ending a block header and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Outdent and write the line closing a block.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Outdent, write a line and indent again, e.g. `} else {`.
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.open(text);
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn outdent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// `#pragma mark - <title>` followed by a blank line.
    pub fn section(&mut self, title: impl AsRef<str>) {
        self.line(format!("#pragma mark - {}", title.as_ref()));
        self.blank();
    }

    /// A `// <text>` heading followed by a blank line.
    pub fn heading(&mut self, text: impl AsRef<str>) {
        self.line(format!("// {}", text.as_ref()));
        self.blank();
    }

    /// `#define NAME value` with the name padded to `width` columns.
    pub fn define(&mut self, name: &str, value: &str, width: usize) {
        self.line(format!("#define {:<width$} {}", name, value, width = width));
    }

    /// Relocate a code block between `//+ path` and `//- path` markers at
    /// the current indentation. Top-level blocks are `padded` with a blank
    /// line on each side of the code.
    pub fn code_block(&mut self, path: &CodePath, text: &str, padded: bool) {
        self.line(format!("//+ {}", path));
        if padded {
            self.blank();
        }
        for line in text.lines() {
            self.line(line);
        }
        if padded {
            self.blank();
        }
        self.line(format!("//- {}", path));
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{DeviceKind, DeviceRole};

    #[test]
    fn test_indentation() {
        let mut w = SourceWriter::new();
        w.open("if (x) {");
        w.line("y();");
        w.blank();
        w.reopen("} else {");
        w.line("z();");
        w.close("}");
        assert_eq!(w.finish(), "if (x) {\n\ty();\n\n} else {\n\tz();\n}\n");
    }

    #[test]
    fn test_define_alignment() {
        let mut w = SourceWriter::new();
        w.define("DRIVER_NAME", "\"indigo_aux_x\"", DEFINE_WIDTH);
        assert_eq!(w.finish(), "#define DRIVER_NAME          \"indigo_aux_x\"\n");
    }

    #[test]
    fn test_code_block_markers() {
        let path = CodePath::Device {
            device: DeviceKind::Aux,
            role: DeviceRole::OnTimer,
        };
        let mut w = SourceWriter::new();
        w.indent();
        w.code_block(&path, "if (a) {\n\tb();\n}\n\nc();", false);
        assert_eq!(
            w.finish(),
            "\t//+ aux.on_timer\n\tif (a) {\n\t\tb();\n\t}\n\n\tc();\n\t//- aux.on_timer\n"
        );
    }
}
