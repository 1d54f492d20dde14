//! Interface header declaring the driver entry point.

use super::writer::SourceWriter;
use super::preamble;
use crate::dsl::Driver;

pub fn generate(driver: &Driver, source_name: &str) -> String {
    let base = driver.base_name();
    let guard = format!("{}_h", base);
    let mut w = SourceWriter::new();
    preamble(&mut w, driver, source_name);
    w.line(format!("#ifndef {}", guard));
    w.line(format!("#define {}", guard));
    w.blank();
    w.line("#include <indigo/indigo_driver.h>");
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");
    w.blank();
    w.line(format!(
        "extern indigo_result {}(indigo_driver_action action, indigo_driver_info *info);",
        base
    ));
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank();
    w.line(format!("#endif /* {} */", guard));
    w.finish()
}

#[cfg(test)]
mod tests {
    use crate::dsl::parse;

    #[test]
    fn test_header_declares_entry_point() {
        let driver = parse("driver foo { ccd; }").unwrap();
        let header = super::generate(&driver, "indigo_ccd_foo.driver");
        assert!(header.contains("#ifndef indigo_ccd_foo_h\n#define indigo_ccd_foo_h\n"));
        assert!(header.contains(
            "extern indigo_result indigo_ccd_foo(indigo_driver_action action, indigo_driver_info *info);"
        ));
        assert!(header.ends_with("#endif /* indigo_ccd_foo_h */\n"));
    }
}
