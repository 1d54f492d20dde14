//! Stand-alone executable wrapper running the driver over stdin/stdout.

use super::writer::SourceWriter;
use super::preamble;
use crate::dsl::Driver;

pub fn generate(driver: &Driver, source_name: &str) -> String {
    let base = driver.base_name();
    let mut w = SourceWriter::new();
    preamble(&mut w, driver, source_name);
    w.line("#include <stdio.h>");
    w.line("#include <string.h>");
    w.blank();
    w.line("#include <indigo/indigo_driver_xml.h>");
    w.blank();
    w.line(format!("#include \"{}.h\"", base));
    w.blank();
    w.open("int main(int argc, const char * argv[]) {");
    w.line("indigo_main_argc = argc;");
    w.line("indigo_main_argv = argv;");
    w.line("indigo_client *protocol_adapter = indigo_xml_device_adapter(&indigo_stdin_handle, &indigo_stdout_handle);");
    w.line("indigo_start();");
    w.line(format!("{}(INDIGO_DRIVER_INIT, NULL);", base));
    w.line("indigo_attach_client(protocol_adapter);");
    w.line("indigo_xml_parse(NULL, protocol_adapter);");
    w.line(format!("{}(INDIGO_DRIVER_SHUTDOWN, NULL);", base));
    w.line("indigo_stop();");
    w.line("return 0;");
    w.close("}");
    w.finish()
}
