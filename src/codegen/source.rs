//! Driver implementation file.

use super::writer::{SourceWriter, DEFINE_WIDTH};
use super::{device, hotplug, preamble};
use crate::dsl::{CodePath, Driver, DriverRole, PropertyKind};

/// Minimum column width of property and item handle defines.
const PROPERTY_WIDTH: usize = 30;

pub fn generate(driver: &Driver, source_name: &str) -> String {
    let mut w = SourceWriter::new();
    preamble(&mut w, driver, source_name);
    history(&mut w, driver);
    includes(&mut w, driver);
    common_definitions(&mut w, driver);
    property_definitions(&mut w, driver);
    private_data(&mut w, driver);
    low_level_code(&mut w, driver);
    for device in &driver.devices {
        device::high_level_code(&mut w, driver, device);
        device::device_api(&mut w, driver, device);
    }
    templates(&mut w, driver);
    if driver.uses_hotplug() {
        hotplug::generate(&mut w, driver);
    } else {
        main_code(&mut w, driver);
    }
    w.finish()
}

/// Emit a top-level driver code block followed by a blank line.
pub(super) fn driver_block(w: &mut SourceWriter, driver: &Driver, role: DriverRole) {
    if let Some(block) = driver.code(role) {
        w.code_block(&CodePath::Driver(role), &block.text, true);
        w.blank();
    }
}

/// Emit a driver code block inline at the current indentation.
pub(super) fn inline_driver_block(w: &mut SourceWriter, driver: &Driver, role: DriverRole) {
    if let Some(block) = driver.code(role) {
        w.code_block(&CodePath::Driver(role), &block.text, false);
    }
}

fn history(w: &mut SourceWriter, driver: &Driver) {
    if !driver.todos.is_empty() {
        for todo in &driver.todos {
            w.line(todo);
        }
        w.blank();
    }
    if !driver.author.is_empty() {
        w.line("// version history");
        w.line(format!("// 3.0 by {}", driver.author));
        w.blank();
    }
}

fn includes(w: &mut SourceWriter, driver: &Driver) {
    w.section("Includes");
    for header in ["stdlib.h", "string.h", "math.h", "assert.h", "pthread.h"] {
        w.line(format!("#include <{}>", header));
    }
    w.line("#include <indigo/indigo_driver_xml.h>");
    for device in &driver.devices {
        w.line(format!("#include <indigo/indigo_{}_driver.h>", device.kind));
    }
    if driver.serial.is_some() {
        w.line("#include <indigo/indigo_uni_io.h>");
    }
    if driver.usb.is_some() {
        w.line("#include <libusb-1.0/libusb.h>");
    }
    w.blank();
    w.line(format!("#include \"{}.h\"", driver.base_name()));
    w.blank();
    driver_block(w, driver, DriverRole::Include);
}

fn common_definitions(w: &mut SourceWriter, driver: &Driver) {
    w.section("Common definitions");
    w.define("DRIVER_VERSION", &format!("0x0300{:04X}", driver.version), DEFINE_WIDTH);
    w.define("DRIVER_NAME", &format!("\"{}\"", driver.base_name()), DEFINE_WIDTH);
    w.define("DRIVER_LABEL", &format!("\"{}\"", driver.label), DEFINE_WIDTH);
    for device in &driver.devices {
        w.define(&device.name_symbol(), &device.name, DEFINE_WIDTH);
    }
    w.define(
        "PRIVATE_DATA",
        &format!("(({} *)device->private_data)", driver.private_data_type()),
        DEFINE_WIDTH,
    );
    w.blank();
    if !driver.definitions.is_empty() {
        let width = driver
            .definitions
            .iter()
            .map(|definition| definition.name.len())
            .max()
            .unwrap_or(0)
            .max(DEFINE_WIDTH);
        for definition in &driver.definitions {
            w.define(&definition.name, &definition.value, width);
        }
        w.blank();
    }
    driver_block(w, driver, DriverRole::Define);
}

fn property_definitions(w: &mut SourceWriter, driver: &Driver) {
    w.section("Property definitions");
    let properties = driver
        .devices
        .iter()
        .flat_map(|device| &device.properties)
        .filter(|property| property.kind != PropertyKind::Inherited);
    for property in properties {
        let width = property.width.max(PROPERTY_WIDTH);
        w.line(format!("// {} handles definition", property.id));
        w.define(&property.handle, &format!("({})", property.pointer()), width);
        for (index, item) in property.items.iter().enumerate() {
            w.define(
                &item.handle,
                &format!("({}->items + {})", property.handle, index),
                width,
            );
        }
        if let Some(wire_name) = &property.wire_name {
            w.define(&property.name, &format!("\"{}\"", wire_name), width);
        }
        for item in &property.items {
            if let Some(wire_name) = &item.wire_name {
                w.define(&item.name, &format!("\"{}\"", wire_name), width);
            }
        }
        w.blank();
    }
}

fn private_data(w: &mut SourceWriter, driver: &Driver) {
    w.section("Private data definition");
    w.open("typedef struct {");
    w.line("pthread_mutex_t mutex;");
    if driver.devices.len() > 1 {
        w.line("int count;");
    }
    if driver.serial.is_some() {
        w.line("indigo_uni_handle *handle;");
    }
    if driver.usb.is_some() {
        w.line("libusb_device *dev;");
    }
    for property in driver.devices.iter().flat_map(|device| &device.properties) {
        if property.owns_storage() {
            w.line(format!("indigo_property *{};", property.handle.to_ascii_lowercase()));
        }
    }
    inline_driver_block(w, driver, DriverRole::Data);
    w.close(format!("}} {};", driver.private_data_type()));
    w.blank();
}

fn low_level_code(w: &mut SourceWriter, driver: &Driver) {
    w.section("Low level code");
    driver_block(w, driver, DriverRole::Code);
}

fn templates(w: &mut SourceWriter, driver: &Driver) {
    w.section("Device templates");
    for device in &driver.devices {
        let prefix = device.kind.keyword();
        w.line(format!(
            "static indigo_device {0}_template = INDIGO_DEVICE_INITIALIZER({1}, {0}_attach, {0}_enumerate_properties, {0}_change_property, NULL, {0}_detach);",
            prefix,
            device.name_symbol()
        ));
    }
    w.blank();
}

/// Register the serial match patterns with the first device template.
pub(super) fn match_patterns(w: &mut SourceWriter, driver: &Driver) {
    let (Some(serial), Some(first)) = (&driver.serial, driver.devices.first()) else {
        return;
    };
    if serial.patterns.is_empty() {
        return;
    }
    let count = serial.patterns.len();
    w.line(format!(
        "static indigo_device_match_pattern patterns[{}] = {{ 0 }};",
        count
    ));
    for (index, pattern) in serial.patterns.iter().enumerate() {
        let strings = [
            ("product_string", &pattern.product_string),
            ("vendor_string", &pattern.vendor_string),
            ("serial_string", &pattern.serial_string),
        ];
        for (field, value) in strings {
            if let Some(value) = value {
                w.line(format!("strcpy(patterns[{}].{}, {});", index, field, value));
            }
        }
        for (field, value) in [("product_id", &pattern.product_id), ("vendor_id", &pattern.vendor_id)] {
            if let Some(value) = value {
                w.line(format!("patterns[{}].{} = {};", index, field, value));
            }
        }
        if pattern.exact_match {
            w.line(format!("patterns[{}].exact_match = true;", index));
        }
    }
    w.line(format!(
        "INDIGO_REGISER_MATCH_PATTERNS({}_template, patterns, {});",
        first.kind, count
    ));
}

/// `// <label> driver entry point` heading and the entry point signature.
pub(super) fn entry_point_header(w: &mut SourceWriter, driver: &Driver) {
    let title = if driver.label.is_empty() {
        &driver.name
    } else {
        &driver.label
    };
    w.heading(format!("{} driver entry point", title));
    w.open(format!(
        "indigo_result {}(indigo_driver_action action, indigo_driver_info *info) {{",
        driver.base_name()
    ));
    w.line("static indigo_driver_action last_action = INDIGO_DRIVER_SHUTDOWN;");
}

/// `SET_DRIVER_INFO` and the repeated action check.
pub(super) fn driver_info(w: &mut SourceWriter, hotplug: bool) {
    w.blank();
    w.line(format!(
        "SET_DRIVER_INFO(info, DRIVER_LABEL, __FUNCTION__, DRIVER_VERSION, {}, last_action);",
        hotplug
    ));
    w.blank();
    w.open("if (action == last_action) {");
    w.line("return INDIGO_OK;");
    w.close("}");
    w.blank();
}

fn main_code(w: &mut SourceWriter, driver: &Driver) {
    let data_type = driver.private_data_type();
    w.section("Main code");
    entry_point_header(w, driver);
    w.line(format!("static {} *private_data = NULL;", data_type));
    for device in &driver.devices {
        w.line(format!("static indigo_device *{} = NULL;", device.kind));
    }
    driver_info(w, false);

    w.open("switch (action) {");
    w.open("case INDIGO_DRIVER_INIT:");
    w.line("last_action = action;");
    inline_driver_block(w, driver, DriverRole::OnInit);
    match_patterns(w, driver);
    w.line(format!("private_data = indigo_safe_malloc(sizeof({}));", data_type));
    w.line("pthread_mutex_init(&private_data->mutex, NULL);");
    let first = driver.devices.first().map(|device| device.kind);
    for device in &driver.devices {
        let var = device.kind.keyword();
        w.line(format!(
            "{0} = indigo_safe_malloc_copy(sizeof(indigo_device), &{0}_template);",
            var
        ));
        w.line(format!("{}->private_data = private_data;", var));
        if let Some(first) = first.filter(|first| *first != device.kind) {
            w.line(format!("{}->master_device = {};", var, first));
        }
        w.line(format!("indigo_attach_device({});", var));
    }
    w.line("break;");
    w.outdent();
    w.blank();

    w.open("case INDIGO_DRIVER_SHUTDOWN:");
    for device in &driver.devices {
        w.line(format!("VERIFY_NOT_CONNECTED({});", device.kind));
    }
    w.line("last_action = action;");
    for device in driver.devices.iter().rev() {
        let var = device.kind.keyword();
        w.open(format!("if ({} != NULL) {{", var));
        w.line(format!("indigo_detach_device({});", var));
        w.line(format!("free({});", var));
        w.line(format!("{} = NULL;", var));
        w.close("}");
    }
    w.open("if (private_data != NULL) {");
    w.line("pthread_mutex_destroy(&private_data->mutex);");
    w.line("free(private_data);");
    w.line("private_data = NULL;");
    w.close("}");
    inline_driver_block(w, driver, DriverRole::OnShutdown);
    w.line("break;");
    w.outdent();
    w.blank();

    w.open("case INDIGO_DRIVER_INFO:");
    w.line("break;");
    w.outdent();
    w.close("}");
    w.blank();
    w.line("return INDIGO_OK;");
    w.close("}");
}
