//! Reverse extractor.
//!
//! Rebuilds a [`Driver`] from a previously generated implementation file so
//! that hand edits made to the C source can be carried back into the driver
//! definition. This is a line scanner, not a C parser: each line is matched
//! against the fixed shapes the generator emits and anything else is
//! skipped. Relocated code is recovered from the `//+ path` / `//- path`
//! marker comments.
//!
//! Extraction never fails on content. The only error is failing to read the
//! input file.

mod patterns;

use std::collections::HashMap;
use std::path::Path;

use log::{debug, trace, warn};

use crate::codegen::GENERATED_FROM;
use crate::dsl::{
    default_pointer, CodeBlock, CodePath, Definition, Device, DeviceKind, Driver, Item, ItemValue,
    Property, PropertyKind, Role, SerialPattern, SerialTransport, UsbTransport, RO_PERM,
    TODO_MARKER,
};
use crate::error::{GeneratorError, Result};
use patterns::*;

/// Extract a driver definition from generated source text.
pub fn extract(source: &str) -> Driver {
    let mut extractor = Extractor::new();
    for (index, line) in source.lines().enumerate() {
        extractor.line(index, line);
    }
    extractor.finish()
}

/// Extract a driver definition from a generated source file.
pub fn extract_file(path: &Path) -> Result<Driver> {
    let content = std::fs::read_to_string(path).map_err(|e| GeneratorError::read(path, e))?;
    Ok(extract(&content))
}

/// Part of the generated file the scanner is in.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Includes,
    CommonDefinitions,
    PropertyDefinitions,
    HighLevel(DeviceKind),
    DeviceApi(DeviceKind),
    Main,
    Other,
}

/// A relocated code block being collected.
struct OpenBlock {
    marker: String,
    path: Option<CodePath>,
    indent: String,
    lines: Vec<String>,
}

struct Extractor {
    driver: Driver,
    section: Section,
    block: Option<OpenBlock>,
    /// Handle of the property whose items are being initialised
    current: Option<String>,
    /// Handle of the property whose change dispatch is being read
    dispatch: Option<String>,
    /// Inside the `if (IS_CONNECTED)` block of an enumerate callback
    connected: bool,
    /// `#define HANDLE (pointer)` lines of the property definitions
    pointers: HashMap<String, String>,
    /// `#define SYMBOL "wire"` lines of the property definitions
    wire_names: HashMap<String, String>,
    /// Property handles in the order the attach callbacks set them up
    attach_order: Vec<(DeviceKind, String)>,
    skipped: usize,
}

impl Extractor {
    fn new() -> Self {
        Self {
            driver: Driver::new(""),
            section: Section::Preamble,
            block: None,
            current: None,
            dispatch: None,
            connected: false,
            pointers: HashMap::new(),
            wire_names: HashMap::new(),
            attach_order: Vec::new(),
            skipped: 0,
        }
    }

    fn line(&mut self, index: usize, raw: &str) {
        if self.block.is_some() {
            self.block_line(raw);
            return;
        }
        if let Some(captures) = MARKER_OPEN.captures(raw) {
            let marker = captures[2].to_string();
            let path = match marker.parse::<CodePath>() {
                Ok(path) => Some(path),
                Err(message) => {
                    warn!("line {}: {}; block skipped", index + 1, message);
                    None
                }
            };
            self.block = Some(OpenBlock {
                marker,
                path,
                indent: captures[1].to_string(),
                lines: Vec::new(),
            });
            return;
        }

        let line = raw.trim();
        if index == 0 {
            if let Some(copyright) = line.strip_prefix("//") {
                self.driver.copyright = copyright.strip_prefix(' ').unwrap_or(copyright).to_string();
                return;
            }
        }
        if let Some(captures) = SECTION.captures(line) {
            self.enter_section(&captures[1]);
            return;
        }

        let recognised = match self.section {
            Section::Preamble => self.preamble_line(line),
            Section::Includes => self.include_line(line),
            Section::CommonDefinitions => self.common_definition(line),
            Section::PropertyDefinitions => self.property_definition(line),
            Section::HighLevel(_) => false,
            Section::DeviceApi(kind) => self.device_api_line(kind, line),
            Section::Main => self.main_line(line),
            Section::Other => false,
        };
        if !recognised && !line.is_empty() {
            self.skipped += 1;
        }
    }

    fn block_line(&mut self, raw: &str) {
        let Some(block) = self.block.as_mut() else {
            return;
        };
        if let Some(captures) = MARKER_CLOSE.captures(raw) {
            if captures[1] == block.marker {
                if let Some(block) = self.block.take() {
                    self.close_block(block);
                }
                return;
            }
        }
        let text = raw.trim_end();
        let line = match text.strip_prefix(block.indent.as_str()) {
            Some(rest) => rest,
            None => text.trim_start(),
        };
        block.lines.push(line.to_string());
    }

    fn close_block(&mut self, block: OpenBlock) {
        let Some(path) = block.path else {
            return;
        };
        let text = block.lines.join("\n");
        let text = text.trim_end();
        trace!("recovered {} ({} bytes)", path, text.len());
        match path {
            CodePath::Driver(role) => {
                self.driver.code.retain(|code| code.role != role);
                self.driver.code.push(CodeBlock::new(role, text));
            }
            CodePath::Device { device, role } => {
                let device = self.device_mut(device);
                device.code.retain(|code| code.role != role);
                device.code.push(CodeBlock::new(role, text));
            }
            CodePath::Property {
                device,
                property,
                role,
            } => {
                let property = self.property_by_id(device, &property);
                property.code.retain(|code| code.role != role);
                property.code.push(CodeBlock::new(role, text));
            }
        }
    }

    fn enter_section(&mut self, title: &str) {
        self.current = None;
        self.dispatch = None;
        self.connected = false;
        self.section = match title {
            "Includes" => Section::Includes,
            "Common definitions" => Section::CommonDefinitions,
            "Property definitions" => Section::PropertyDefinitions,
            "Main code" => Section::Main,
            _ => match DEVICE_SECTION.captures(title) {
                Some(captures) => match DeviceKind::from_keyword(&captures[2]) {
                    Some(kind) => {
                        self.device_mut(kind);
                        if &captures[1] == "Device API" {
                            Section::DeviceApi(kind)
                        } else {
                            Section::HighLevel(kind)
                        }
                    }
                    None => Section::Other,
                },
                None => Section::Other,
            },
        };
        debug!("section '{}'", title);
    }

    fn preamble_line(&mut self, line: &str) -> bool {
        if line.starts_with(TODO_MARKER) {
            self.driver.todos.push(line.to_string());
        } else if let Some(captures) = AUTHOR.captures(line) {
            self.driver.author = captures[1].to_string();
        } else {
            return line.starts_with("//");
        }
        true
    }

    fn include_line(&mut self, line: &str) -> bool {
        let Some(captures) = INCLUDE.captures(line) else {
            return false;
        };
        match &captures[1] {
            "indigo/indigo_uni_io.h" => {
                self.driver.serial.get_or_insert_with(SerialTransport::default);
            }
            "libusb-1.0/libusb.h" => {
                self.driver.usb.get_or_insert_with(UsbTransport::default);
            }
            _ => {}
        }
        true
    }

    fn common_definition(&mut self, line: &str) -> bool {
        let Some(captures) = DEFINE.captures(line) else {
            return false;
        };
        let (name, value) = (&captures[1], &captures[2]);
        match name {
            "DRIVER_VERSION" => {
                if let Some(version) = VERSION
                    .captures(value)
                    .and_then(|c| u32::from_str_radix(&c[1], 16).ok())
                {
                    self.driver.version = version;
                }
            }
            "DRIVER_NAME" => {
                let base = unquote(value);
                let name = base
                    .strip_prefix("indigo_")
                    .and_then(|rest| rest.split_once('_'))
                    .map_or(base, |(_, name)| name);
                self.driver.name = name.to_string();
            }
            "DRIVER_LABEL" => self.driver.label = unquote(value).to_string(),
            "PRIVATE_DATA" => {}
            _ => match device_name_kind(name) {
                Some(kind) => self.device_mut(kind).name = value.to_string(),
                None => self.driver.definitions.push(Definition {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            },
        }
        true
    }

    fn property_definition(&mut self, line: &str) -> bool {
        if line.starts_with("// ") && line.ends_with(" handles definition") {
            return true;
        }
        let Some(captures) = DEFINE.captures(line) else {
            return false;
        };
        let (name, value) = (captures[1].to_string(), &captures[2]);
        if value.starts_with('"') {
            self.wire_names.insert(name, unquote(value).to_string());
        } else if let Some(pointer) = value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
            self.pointers.insert(name, pointer.to_string());
        }
        true
    }

    fn device_api_line(&mut self, kind: DeviceKind, line: &str) -> bool {
        if line == "if (IS_CONNECTED) {" {
            self.connected = true;
            return true;
        }
        if line == "}" {
            self.connected = false;
            return true;
        }
        if line == "return INDIGO_OK;" {
            self.dispatch = None;
            return true;
        }
        match line {
            "ADDITIONAL_INSTANCES_PROPERTY->hidden = DEVICE_CONTEXT->base_device != NULL;" => {
                self.device_mut(kind).additional_instances = true;
                return true;
            }
            "DEVICE_BAUDRATE_PROPERTY->hidden = false;" => {
                self.driver
                    .serial
                    .get_or_insert_with(SerialTransport::default)
                    .configurable_speed = true;
                return true;
            }
            "DEVICE_PORT_PROPERTY->hidden = false;"
            | "DEVICE_PORTS_PROPERTY->hidden = false;"
            | "indigo_enumerate_serial_ports(device, DEVICE_PORTS_PROPERTY);" => {
                self.driver.serial.get_or_insert_with(SerialTransport::default);
                return true;
            }
            _ => {}
        }

        if let Some(captures) = AUX_ATTACH.captures(line) {
            self.device_mut(kind).interface = captures[1].to_string();
        } else if let Some(captures) = PROPERTY_INIT.captures(line) {
            self.property_init(kind, &captures[1], &captures[2], &captures[3]);
        } else if let Some(captures) = ITEM_INIT.captures(line) {
            self.item_init(kind, &captures[1], &captures[2]);
        } else if let Some(captures) = NUMBER_FORMAT.captures(line) {
            self.number_format(kind, &captures[1], &captures[2]);
        } else if let Some(captures) = HIDDEN.captures(line) {
            self.hidden(kind, &captures[1], &captures[2]);
        } else if let Some(captures) = DEFINE_MATCHING.captures(line) {
            let always_defined = !self.connected;
            if let Some(property) = self.property_by_handle(kind, &captures[1]) {
                property.always_defined = always_defined;
            }
        } else if let Some(captures) = MATCH_CHANGEABLE.captures(line) {
            let handle = &captures[1];
            self.dispatch = None;
            if handle != "CONNECTION_PROPERTY" && handle != "CONFIG_PROPERTY" {
                if let Some(property) = self.property_by_handle(kind, handle) {
                    property.handle_change = true;
                    property.asynchronous_change = true;
                    property.preserve_values = false;
                    self.dispatch = Some(handle.to_string());
                }
            }
        } else if let Some(captures) = SAVE_PROPERTY.captures(line) {
            if let Some(property) = self.property_by_handle(kind, &captures[1]) {
                property.persistent = true;
            }
        } else {
            return self.dispatch_line(kind, line);
        }
        true
    }

    /// Lines of a property branch of the change property callback.
    fn dispatch_line(&mut self, kind: DeviceKind, line: &str) -> bool {
        let Some(handle) = self.dispatch.clone() else {
            return false;
        };
        let Some(property) = self.property_by_handle(kind, &handle) else {
            return false;
        };
        if let Some(captures) = PROCESS_CHANGE.captures(line) {
            property.asynchronous_change = true;
            property.handler = captures[2].to_string();
        } else if COPY_VALUES.is_match(line) {
            property.asynchronous_change = false;
        } else if COPY_TARGETS.is_match(line) {
            property.preserve_values = true;
            property.asynchronous_change = false;
        } else if let Some(captures) = EXECUTE_HANDLER.captures(line) {
            property.asynchronous_change = true;
            property.handler = captures[1].to_string();
        } else if let Some(captures) = CALL_HANDLER.captures(line) {
            property.handler = captures[1].to_string();
        } else {
            return false;
        }
        true
    }

    fn property_init(&mut self, kind: DeviceKind, handle: &str, keyword: &str, args: &str) {
        let Some(property_kind) = PropertyKind::from_keyword(keyword) else {
            return;
        };
        let args = split_args(args);
        let arg = |index: usize| args.get(index).cloned();
        let property = self.property_by_handle_or_new(kind, handle);
        property.kind = property_kind;
        if let Some(name) = arg(2) {
            property.name = name;
        }
        if let Some(group) = arg(3) {
            property.group = group;
        }
        if let Some(label) = arg(4) {
            property.label = label;
        }
        match property_kind {
            PropertyKind::Light => property.perm = RO_PERM.to_string(),
            PropertyKind::Switch => {
                if let Some(perm) = arg(6) {
                    property.perm = perm;
                }
                if let Some(rule) = arg(7) {
                    property.rule = rule;
                }
            }
            _ => {
                if let Some(perm) = arg(6) {
                    property.perm = perm;
                }
            }
        }
        self.current = Some(handle.to_string());
        self.attach_order.push((kind, handle.to_string()));
    }

    fn item_init(&mut self, kind: DeviceKind, keyword: &str, args: &str) {
        let args = split_args(args);
        let Some(handle) = self.current.clone() else {
            return;
        };
        let Some(property) = self.property_by_handle(kind, &handle) else {
            return;
        };
        let [item_handle, name, label, values @ ..] = args.as_slice() else {
            return;
        };
        let ident = item_handle.strip_suffix("_ITEM").unwrap_or(item_handle.as_str());
        let mut item = Item::new(property.kind, ident);
        item.handle = item_handle.clone();
        item.name = name.clone();
        item.label = label.clone();
        let value = match (keyword, values) {
            ("number", [min, max, step, value, ..]) => Some(ItemValue::Number {
                min: min.clone(),
                max: max.clone(),
                step: step.clone(),
                value: value.clone(),
                format: None,
            }),
            ("text", [value, ..]) => Some(ItemValue::Text(value.clone())),
            ("switch", [value, ..]) => Some(ItemValue::Switch(value.clone())),
            ("light", [value, ..]) => Some(ItemValue::Light(value.clone())),
            _ => None,
        };
        if let Some(value) = value {
            item.value = value;
        }
        property.items.push(item);
    }

    fn number_format(&mut self, kind: DeviceKind, item_handle: &str, format: &str) {
        let Some(handle) = self.current.clone() else {
            return;
        };
        let Some(property) = self.property_by_handle(kind, &handle) else {
            return;
        };
        if let Some(item) = property.items.iter_mut().find(|item| item.handle == item_handle) {
            if let ItemValue::Number { format: target, .. } = &mut item.value {
                *target = Some(format.to_string());
            }
        }
    }

    fn hidden(&mut self, kind: DeviceKind, handle: &str, value: &str) {
        let property = self.property_by_handle_or_new(kind, handle);
        if property.kind == PropertyKind::Inherited {
            property.hidden = (value != "false").then(|| value.to_string());
            self.current = None;
            self.attach_order.push((kind, handle.to_string()));
        } else {
            property.hidden = Some(value.to_string());
        }
    }

    fn main_line(&mut self, line: &str) -> bool {
        if let Some(captures) = PATTERN_STRING.captures(line) {
            let value = captures[3].to_string();
            if let Some(pattern) = self.pattern_mut(&captures[1]) {
                match &captures[2] {
                    "product_string" => pattern.product_string = Some(value),
                    "vendor_string" => pattern.vendor_string = Some(value),
                    "serial_string" => pattern.serial_string = Some(value),
                    _ => return false,
                }
            }
        } else if let Some(captures) = PATTERN_FIELD.captures(line) {
            let value = captures[3].to_string();
            if let Some(pattern) = self.pattern_mut(&captures[1]) {
                match &captures[2] {
                    "product_id" => pattern.product_id = Some(value),
                    "vendor_id" => pattern.vendor_id = Some(value),
                    "exact_match" => pattern.exact_match = value == "true",
                    _ => return false,
                }
            }
        } else if let Some(captures) = HOTPLUG_REGISTER.captures(line) {
            let args = split_args(&captures[1]);
            let filter = |index: usize| {
                args.get(index)
                    .filter(|value| value.as_str() != "LIBUSB_HOTPLUG_MATCH_ANY")
                    .cloned()
            };
            let usb = self.driver.usb.get_or_insert_with(UsbTransport::default);
            usb.hotplug = true;
            usb.vendor_id = filter(3);
            usb.product_id = filter(4);
        } else {
            return false;
        }
        true
    }

    fn pattern_mut(&mut self, index: &str) -> Option<&mut SerialPattern> {
        let index: usize = index.parse().ok()?;
        let serial = self.driver.serial.get_or_insert_with(SerialTransport::default);
        if serial.patterns.len() <= index {
            serial.patterns.resize_with(index + 1, SerialPattern::default);
        }
        serial.patterns.get_mut(index)
    }

    fn device_mut(&mut self, kind: DeviceKind) -> &mut Device {
        let devices = &mut self.driver.devices;
        let index = match devices.iter().position(|device| device.kind == kind) {
            Some(index) => index,
            None => {
                devices.push(Device::new(kind, devices.len()));
                devices.len() - 1
            }
        };
        &mut devices[index]
    }

    fn property_by_handle(&mut self, kind: DeviceKind, handle: &str) -> Option<&mut Property> {
        self.device_mut(kind)
            .properties
            .iter_mut()
            .find(|property| property.handle == handle)
    }

    fn property_by_handle_or_new(&mut self, kind: DeviceKind, handle: &str) -> &mut Property {
        let id = handle.strip_suffix("_PROPERTY").unwrap_or(handle).to_string();
        let device = self.device_mut(kind);
        let index = device
            .properties
            .iter()
            .position(|property| property.handle == handle)
            .or_else(|| device.properties.iter().position(|property| property.id == id));
        let index = match index {
            Some(index) => index,
            None => {
                device.properties.push(placeholder(kind, &id));
                device.properties.len() - 1
            }
        };
        let property = &mut device.properties[index];
        property.handle = handle.to_string();
        property
    }

    fn property_by_id(&mut self, kind: DeviceKind, id: &str) -> &mut Property {
        let device = self.device_mut(kind);
        let index = match device.properties.iter().position(|property| property.id == id) {
            Some(index) => index,
            None => {
                device.properties.push(placeholder(kind, id));
                device.properties.len() - 1
            }
        };
        &mut device.properties[index]
    }

    fn finish(mut self) -> Driver {
        if let Some(block) = self.block.take() {
            warn!("unterminated code block '{}' dropped", block.marker);
        }
        sort_code(&mut self.driver.code);
        for device in &mut self.driver.devices {
            sort_code(&mut device.code);
            let kind = device.kind;
            let position = |handle: &str| {
                self.attach_order
                    .iter()
                    .position(|(k, h)| *k == kind && h == handle)
                    .unwrap_or(usize::MAX)
            };
            device
                .properties
                .sort_by_key(|property| position(&property.handle));
            for property in &mut device.properties {
                sort_code(&mut property.code);
                if let Some(pointer) = self.pointers.get(&property.handle) {
                    if *pointer != default_pointer(&property.handle) {
                        property.pointer = Some(pointer.clone());
                    }
                }
                property.wire_name = self.wire_names.get(&property.name).cloned();
                for item in &mut property.items {
                    item.wire_name = self.wire_names.get(&item.name).cloned();
                }
                property.width = property.compute_width();
            }
        }
        self.driver.update_virtual();
        debug!(
            "extracted driver '{}': {} devices, {} properties, {} lines not recognised",
            self.driver.name,
            self.driver.devices.len(),
            self.driver
                .devices
                .iter()
                .map(|device| device.properties.len())
                .sum::<usize>(),
            self.skipped
        );
        self.driver
    }
}

/// A property known only by id until its attach code is seen.
fn placeholder(kind: DeviceKind, id: &str) -> Property {
    let mut property = Property::new(PropertyKind::Inherited, kind, id);
    property.handle_change = false;
    property
}

/// Device kind of a `<TYPE>_DEVICE_NAME` symbol.
fn device_name_kind(name: &str) -> Option<DeviceKind> {
    let upper = name.strip_suffix("_DEVICE_NAME")?;
    DeviceKind::from_keyword(&upper.to_ascii_lowercase())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

/// Put code blocks in the order their roles are declared.
fn sort_code<R: Role>(code: &mut [CodeBlock<R>]) {
    code.sort_by_key(|block| R::ALL.iter().position(|role| *role == block.role));
}

/// True when `source` carries the comment the generator writes at the top of
/// every implementation file.
pub fn is_generated(source: &str) -> bool {
    source.lines().take(40).any(|line| line.starts_with(GENERATED_FROM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, GenerateOptions};
    use crate::dsl::{parse, print, DeviceRole, DriverRole, PropertyRole};

    fn round_trip(input: &str) -> (Driver, Driver) {
        let driver = parse(input).unwrap();
        let source = generate(&driver, &GenerateOptions::for_driver(&driver)).source;
        (driver, extract(&source))
    }

    const FULL: &str = r#"
// TODO: check the reply timeout
driver upb {
    label = "Ultimate Powerbox";
    author = "Jane Doe";
    copyright = "Copyright (c) 2025 Jane Doe";
    version = 12;
    POLL_TIME = 5;
    serial {
        configurable_speed = true;
        pattern { product_string = "UPB"; vendor_id = 0x0403; exact_match = true; }
    }
    include {
        #include <errno.h>
    }
    code {
        static bool upb_open(indigo_device *device) {
            return true;
        }

        static void upb_close(indigo_device *device) {
        }
    }
    on_init {
        srand(1);
    }
    aux {
        interface = INDIGO_INTERFACE_AUX_POWERBOX;
        additional_instances = true;
        on_timer {
            indigo_execute_handler_in(device, POLL_TIME, aux_timer_callback);
        }
        on_connect {
            upb_init(device);
        }
        switch power_outlet {
            label = "Power outlets";
            group = "Power";
            rule = INDIGO_ANY_OF_MANY_RULE;
            persistent = true;
            item outlet_1 { label = "Outlet #1"; value = true; name = "OUT1"; }
            item outlet_2 { label = "Outlet #2"; }
            on_change {
                if (OUTLET_1_ITEM->sw.value) {
                    upb_command(device, "P1:1");
                }
            }
        }
        number heater {
            asynchronous_change = false;
            hidden = true;
            item power { label = "Power (%)"; max = 100; step = 1; format = "%.0f"; }
        }
        text info {
            always_defined = true;
            handle_change = false;
            perm = INDIGO_RO_PERM;
            name = "X_INFO";
            item version { label = "Firmware"; }
        }
        light status {
            item ok { value = INDIGO_OK_STATE; }
        }
        inherited AUX_WEATHER {
            preserve_values = true;
            on_attach {
                AUX_WEATHER_PROPERTY->count = 2;
            }
        }
    }
    focuser {
        number position { pointer = FOCUSER_POSITION_PROPERTY; item value { max = 10000; } }
        on_detach {
            cleanup(device);
        }
    }
}
"#;

    #[test]
    fn test_round_trip_recovers_driver() {
        let (driver, extracted) = round_trip(FULL);
        assert_eq!(extracted.name, "upb");
        assert_eq!(extracted.label, "Ultimate Powerbox");
        assert_eq!(extracted.author, "Jane Doe");
        assert_eq!(extracted.copyright, driver.copyright);
        assert_eq!(extracted.version, 12);
        assert_eq!(extracted.todos, ["// TODO: check the reply timeout"]);
        assert_eq!(extracted.definitions, driver.definitions);
        assert_eq!(extracted.serial, driver.serial);
        assert_eq!(extracted.usb, None);
        assert!(!extracted.is_virtual);
        assert_eq!(extracted.code, driver.code);
        assert_eq!(extracted.devices.len(), 2);
    }

    #[test]
    fn test_round_trip_recovers_properties_and_items() {
        let (driver, extracted) = round_trip(FULL);
        for (expected, actual) in driver.devices.iter().zip(&extracted.devices) {
            assert_eq!(actual.kind, expected.kind);
            assert_eq!(actual.name, expected.name);
            assert_eq!(actual.interface, expected.interface);
            assert_eq!(actual.additional_instances, expected.additional_instances);
            let mut code = expected.code.clone();
            sort_code(&mut code);
            assert_eq!(actual.code, code);
            assert_eq!(actual.properties, expected.properties);
        }
    }

    #[test]
    fn test_round_trip_through_printer() {
        let (driver, extracted) = round_trip(FULL);
        let mut driver = driver;
        for device in &mut driver.devices {
            sort_code(&mut device.code);
        }
        assert_eq!(print(&extracted), print(&driver));
    }

    #[test]
    fn test_round_trip_hotplug() {
        let (driver, extracted) = round_trip(
            "driver cam { libusb { hotplug = true; product_id = 0x0501; } ccd; guider; }",
        );
        assert_eq!(extracted.usb, driver.usb);
        assert_eq!(extracted.devices[1].name, "DRIVER_LABEL \" (guider)\"");
    }

    #[test]
    fn test_unrecognised_lines_are_skipped() {
        let driver = parse("driver foo { aux { switch a { item b; } } }").unwrap();
        let mut source = generate(&driver, &GenerateOptions::for_driver(&driver)).source;
        let extracted = extract(&source);
        source.push_str("\nint stray(void) { return 42; }\n#define STRAY 1\n");
        source = source.replace(
            "static indigo_result aux_detach(",
            "// hand edit\nstatic int helper;\nstatic indigo_result aux_detach(",
        );
        assert_eq!(extract(&source), extracted);
    }

    #[test]
    fn test_edited_code_block_is_recovered() {
        let driver = parse("driver foo { aux { on_connect { a(); } switch x { item y; on_change { b(); } } } }").unwrap();
        let source = generate(&driver, &GenerateOptions::for_driver(&driver))
            .source
            .replace("\t\t\ta();\n", "\t\t\ta();\n\t\t\tif (c) {\n\t\t\t\td();\n\t\t\t}\n")
            .replace("\tb();\n", "\tb();\n\n\te();\n");
        let extracted = extract(&source);
        let device = &extracted.devices[0];
        assert_eq!(
            device.code(DeviceRole::OnConnect).unwrap().text,
            "a();\nif (c) {\n\td();\n}"
        );
        let property = device.property("X").unwrap();
        assert_eq!(property.code(PropertyRole::OnChange).unwrap().text, "b();\n\ne();");
    }

    #[test]
    fn test_unknown_marker_is_dropped() {
        let extracted = extract("//\n//+ toaster.on_fire\nburn();\n//- toaster.on_fire\n//+ on_init\ninit();\n//- on_init\n");
        assert!(extracted.devices.is_empty());
        assert_eq!(extracted.code(DriverRole::OnInit).unwrap().text, "init();");
        assert!(extracted.is_virtual);
    }

    #[test]
    fn test_is_generated() {
        let driver = parse("driver foo { aux; }").unwrap();
        let source = generate(&driver, &GenerateOptions::for_driver(&driver)).source;
        assert!(is_generated(&source));
        assert!(!is_generated("driver foo { aux; }"));
    }
}
