//! Abstract Syntax Tree types for the driver definition DSL.
//!
//! The tree is built once per run, either by the [`Parser`](super::Parser)
//! from a definition file or by the [`extract`](crate::extract) module from a
//! previously generated source file, and then walked by the code generator or
//! the DSL printer. Every list keeps the order in which nodes were appended.

use std::fmt;
use std::str::FromStr;

/// Complete AST representation of a driver definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    /// Driver name, used for file and symbol names
    pub name: String,
    /// Human readable label (string contents)
    pub label: String,
    /// Author shown in the version history
    pub author: String,
    /// Copyright line
    pub copyright: String,
    /// Driver version, minor part of `DRIVER_VERSION`
    pub version: u32,
    /// True when neither a serial nor a USB transport is declared
    pub is_virtual: bool,
    /// Free-form `NAME = value;` definitions
    pub definitions: Vec<Definition>,
    /// Driver level code blocks
    pub code: Vec<CodeBlock<DriverRole>>,
    /// Serial transport
    pub serial: Option<SerialTransport>,
    /// USB transport
    pub usb: Option<UsbTransport>,
    /// Devices in declaration order
    pub devices: Vec<Device>,
    /// `// TODO:` comments replayed at the top of the generated source
    pub todos: Vec<String>,
}

impl Driver {
    /// Create a new driver with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            author: String::new(),
            copyright: String::new(),
            version: 0,
            is_virtual: true,
            definitions: Vec::new(),
            code: Vec::new(),
            serial: None,
            usb: None,
            devices: Vec::new(),
            todos: Vec::new(),
        }
    }

    /// Recompute the virtual flag from the declared transports.
    pub fn update_virtual(&mut self) {
        self.is_virtual = self.serial.is_none() && self.usb.is_none();
    }

    /// Base name shared by the generated files and the entry point,
    /// e.g. `indigo_aux_upb`.
    pub fn base_name(&self) -> String {
        let kind = self
            .devices
            .first()
            .map(|device| device.kind.keyword())
            .unwrap_or("aux");
        format!("indigo_{}_{}", kind, self.name)
    }

    /// Name of the generated private data type.
    pub fn private_data_type(&self) -> String {
        format!("{}_private_data", self.name)
    }

    /// True when the driver registers a USB hot-plug callback.
    pub fn uses_hotplug(&self) -> bool {
        self.usb.as_ref().map_or(false, |usb| usb.hotplug)
    }

    /// Look up a driver level code block.
    pub fn code(&self, role: DriverRole) -> Option<&CodeBlock<DriverRole>> {
        self.code.iter().find(|block| block.role == role)
    }

    /// Look up a device by type.
    pub fn device(&self, kind: DeviceKind) -> Option<&Device> {
        self.devices.iter().find(|device| device.kind == kind)
    }
}

/// A free-form `NAME = value;` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub value: String,
}

/// Serial transport descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerialTransport {
    /// Expose the baud rate property
    pub configurable_speed: bool,
    /// Device match patterns
    pub patterns: Vec<SerialPattern>,
}

/// A serial device match pattern. All values are host-language expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerialPattern {
    pub product_id: Option<String>,
    pub vendor_id: Option<String>,
    pub exact_match: bool,
    pub product_string: Option<String>,
    pub vendor_string: Option<String>,
    pub serial_string: Option<String>,
}

/// USB transport descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsbTransport {
    /// Register a hot-plug callback
    pub hotplug: bool,
    /// Vendor id filter expression
    pub vendor_id: Option<String>,
    /// Product id filter expression
    pub product_id: Option<String>,
}

/// Device types supported by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Ccd,
    Wheel,
    Focuser,
    Mount,
    Guider,
    Rotator,
    Dome,
    Gps,
    Ao,
    Aux,
}

impl DeviceKind {
    /// All device kinds.
    pub const ALL: [DeviceKind; 10] = [
        DeviceKind::Ccd,
        DeviceKind::Wheel,
        DeviceKind::Focuser,
        DeviceKind::Mount,
        DeviceKind::Guider,
        DeviceKind::Rotator,
        DeviceKind::Dome,
        DeviceKind::Gps,
        DeviceKind::Ao,
        DeviceKind::Aux,
    ];

    /// Parse a device kind from its DSL keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.keyword() == keyword)
    }

    /// DSL keyword, also the lower-case symbol prefix.
    pub fn keyword(self) -> &'static str {
        match self {
            DeviceKind::Ccd => "ccd",
            DeviceKind::Wheel => "wheel",
            DeviceKind::Focuser => "focuser",
            DeviceKind::Mount => "mount",
            DeviceKind::Guider => "guider",
            DeviceKind::Rotator => "rotator",
            DeviceKind::Dome => "dome",
            DeviceKind::Gps => "gps",
            DeviceKind::Ao => "ao",
            DeviceKind::Aux => "aux",
        }
    }

    /// Upper-case symbol prefix, e.g. `CCD`.
    pub fn upper(self) -> String {
        self.keyword().to_ascii_uppercase()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A device definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Device type
    pub kind: DeviceKind,
    /// Display name expression
    pub name: String,
    /// Interface capability expression (aux devices only)
    pub interface: String,
    /// Supports additional instances
    pub additional_instances: bool,
    /// Device level code blocks
    pub code: Vec<CodeBlock<DeviceRole>>,
    /// Properties in declaration order
    pub properties: Vec<Property>,
}

impl Device {
    /// Create a device with derived defaults; `index` is its position in the
    /// driver's device list.
    pub fn new(kind: DeviceKind, index: usize) -> Self {
        Self {
            kind,
            name: Self::default_name(kind, index),
            interface: Self::default_interface().to_string(),
            additional_instances: false,
            code: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Default display name expression.
    pub fn default_name(kind: DeviceKind, index: usize) -> String {
        if index == 0 {
            "DRIVER_LABEL".to_string()
        } else {
            format!("DRIVER_LABEL \" ({})\"", kind)
        }
    }

    /// Default interface expression.
    pub fn default_interface() -> &'static str {
        "INDIGO_INTERFACE_AUX"
    }

    /// Symbol holding the display name, e.g. `AUX_DEVICE_NAME`.
    pub fn name_symbol(&self) -> String {
        format!("{}_DEVICE_NAME", self.kind.upper())
    }

    /// Look up a device level code block.
    pub fn code(&self, role: DeviceRole) -> Option<&CodeBlock<DeviceRole>> {
        self.code.iter().find(|block| block.role == role)
    }

    /// Look up a property by id.
    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.id == id)
    }
}

/// Property kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Number,
    Switch,
    Light,
    /// Defined by the framework, referenced to attach custom logic
    Inherited,
}

impl PropertyKind {
    /// Parse a property kind from its DSL keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "switch" => Some(Self::Switch),
            "light" => Some(Self::Light),
            "inherited" => Some(Self::Inherited),
            _ => None,
        }
    }

    /// DSL keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Switch => "switch",
            Self::Light => "light",
            Self::Inherited => "inherited",
        }
    }
}

pub const RW_PERM: &str = "INDIGO_RW_PERM";
pub const RO_PERM: &str = "INDIGO_RO_PERM";
pub const ONE_OF_MANY_RULE: &str = "INDIGO_ONE_OF_MANY_RULE";
pub const IDLE_STATE: &str = "INDIGO_IDLE_STATE";

/// A property definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property kind
    pub kind: PropertyKind,
    /// Owning device type
    pub device: DeviceKind,
    /// Upper-case identifier
    pub id: String,
    /// Label expression
    pub label: String,
    /// In-memory reference symbol, e.g. `FOO_PROPERTY`
    pub handle: String,
    /// Wire name symbol, e.g. `FOO_PROPERTY_NAME`
    pub name: String,
    /// Wire name the symbol is defined to, when overridden by a string
    pub wire_name: Option<String>,
    /// Storage location override; `None` means a private data field
    pub pointer: Option<String>,
    /// Change handler function name
    pub handler: String,
    /// Group expression
    pub group: String,
    /// Permission expression
    pub perm: String,
    /// Switch rule expression
    pub rule: String,
    /// Visibility expression
    pub hidden: Option<String>,
    pub handle_change: bool,
    pub asynchronous_change: bool,
    pub persistent: bool,
    pub preserve_values: bool,
    pub always_defined: bool,
    /// Property level code blocks
    pub code: Vec<CodeBlock<PropertyRole>>,
    /// Items in declaration order
    pub items: Vec<Item>,
    /// Column width for aligned `#define` output
    pub width: usize,
}

impl Property {
    /// Create a property with all names and attributes derived from its
    /// identifier.
    pub fn new(kind: PropertyKind, device: DeviceKind, ident: &str) -> Self {
        let id = ident.to_ascii_uppercase();
        let mut property = Self {
            kind,
            device,
            label: quoted(ident),
            handle: format!("{}_PROPERTY", id),
            name: format!("{}_PROPERTY_NAME", id),
            wire_name: None,
            pointer: None,
            handler: default_handler(device, &id),
            group: format!("{}_MAIN_GROUP", device.upper()),
            perm: if kind == PropertyKind::Light { RO_PERM } else { RW_PERM }.to_string(),
            rule: ONE_OF_MANY_RULE.to_string(),
            hidden: None,
            handle_change: true,
            asynchronous_change: true,
            persistent: false,
            preserve_values: false,
            always_defined: false,
            code: Vec::new(),
            items: Vec::new(),
            width: 0,
            id,
        };
        property.handle_change = property.default_handle_change();
        property.width = property.compute_width();
        property
    }

    /// `handle_change` value used when none is given explicitly.
    pub fn default_handle_change(&self) -> bool {
        self.kind != PropertyKind::Light && self.perm != RO_PERM
    }

    /// Storage location expression.
    pub fn pointer(&self) -> String {
        self.pointer
            .clone()
            .unwrap_or_else(|| default_pointer(&self.handle))
    }

    /// True when the generated private data owns the property pointer.
    pub fn owns_storage(&self) -> bool {
        self.kind != PropertyKind::Inherited && self.pointer.is_none()
    }

    /// Maximum symbol length across the property's handle and names and
    /// all of its items.
    pub fn compute_width(&self) -> usize {
        self.items
            .iter()
            .flat_map(|item| [item.handle.len(), item.name.len()])
            .chain([self.handle.len(), self.name.len()])
            .max()
            .unwrap_or(0)
    }

    /// Look up a property level code block.
    pub fn code(&self, role: PropertyRole) -> Option<&CodeBlock<PropertyRole>> {
        self.code.iter().find(|block| block.role == role)
    }
}

/// Default change handler name: `<device>_<id>_handler`, without doubling
/// the device prefix.
pub fn default_handler(device: DeviceKind, id: &str) -> String {
    let lower = id.to_ascii_lowercase();
    let prefix = format!("{}_", device.keyword());
    if lower.starts_with(&prefix) {
        format!("{}_handler", lower)
    } else {
        format!("{}{}_handler", prefix, lower)
    }
}

/// Default storage location for a property handle.
pub fn default_pointer(handle: &str) -> String {
    format!("PRIVATE_DATA->{}", handle.to_ascii_lowercase())
}

/// Wrap text in double quotes.
pub fn quoted(text: &str) -> String {
    format!("\"{}\"", text)
}

/// An item definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Upper-case identifier
    pub id: String,
    /// In-memory reference symbol, e.g. `FOO_BAR_ITEM`
    pub handle: String,
    /// Wire name symbol, e.g. `FOO_BAR_ITEM_NAME`
    pub name: String,
    /// Wire name the symbol is defined to, when overridden by a string
    pub wire_name: Option<String>,
    /// Label expression
    pub label: String,
    /// Kind dependent values
    pub value: ItemValue,
}

impl Item {
    /// Create an item of a property of the given kind.
    pub fn new(kind: PropertyKind, ident: &str) -> Self {
        let id = ident.to_ascii_uppercase();
        Self {
            handle: format!("{}_ITEM", id),
            name: format!("{}_ITEM_NAME", id),
            wire_name: None,
            label: quoted(ident),
            value: ItemValue::default_for(kind),
            id,
        }
    }
}

/// Item values; every value is a host-language expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    Text(String),
    Switch(String),
    Light(String),
    Number {
        min: String,
        max: String,
        step: String,
        value: String,
        format: Option<String>,
    },
}

impl ItemValue {
    /// Default values for an item of the given property kind.
    pub fn default_for(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Number => ItemValue::Number {
                min: "0".to_string(),
                max: "0".to_string(),
                step: "0".to_string(),
                value: "0".to_string(),
                format: None,
            },
            PropertyKind::Switch => ItemValue::Switch("false".to_string()),
            PropertyKind::Light => ItemValue::Light(IDLE_STATE.to_string()),
            PropertyKind::Text | PropertyKind::Inherited => ItemValue::Text("\"\"".to_string()),
        }
    }
}

/// A code block attachment role.
pub trait Role: Copy + Eq + fmt::Debug + 'static {
    /// All roles, in the order they are printed.
    const ALL: &'static [Self];

    /// DSL keyword and marker path component.
    fn keyword(self) -> &'static str;

    /// Parse a role from its keyword.
    fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.keyword() == keyword)
    }
}

/// Driver level code roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverRole {
    Include,
    Define,
    Data,
    Code,
    OnInit,
    OnShutdown,
}

impl Role for DriverRole {
    const ALL: &'static [Self] = &[
        Self::Include,
        Self::Define,
        Self::Data,
        Self::Code,
        Self::OnInit,
        Self::OnShutdown,
    ];

    fn keyword(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Define => "define",
            Self::Data => "data",
            Self::Code => "code",
            Self::OnInit => "on_init",
            Self::OnShutdown => "on_shutdown",
        }
    }
}

/// Device level code roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Code,
    OnTimer,
    OnAttach,
    OnConnect,
    OnDisconnect,
    OnDetach,
}

impl Role for DeviceRole {
    const ALL: &'static [Self] = &[
        Self::Code,
        Self::OnTimer,
        Self::OnAttach,
        Self::OnConnect,
        Self::OnDisconnect,
        Self::OnDetach,
    ];

    fn keyword(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::OnTimer => "on_timer",
            Self::OnAttach => "on_attach",
            Self::OnConnect => "on_connect",
            Self::OnDisconnect => "on_disconnect",
            Self::OnDetach => "on_detach",
        }
    }
}

/// Property level code roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    Code,
    OnAttach,
    OnChange,
    OnDetach,
}

impl Role for PropertyRole {
    const ALL: &'static [Self] = &[Self::Code, Self::OnAttach, Self::OnChange, Self::OnDetach];

    fn keyword(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::OnAttach => "on_attach",
            Self::OnChange => "on_change",
            Self::OnDetach => "on_detach",
        }
    }
}

/// An opaque block of host-language code.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock<R> {
    /// Attachment role
    pub role: R,
    /// Code text without common indentation
    pub text: String,
}

impl<R: Role> CodeBlock<R> {
    /// Create a code block, stripping the indentation shared by all lines.
    pub fn new(role: R, raw: &str) -> Self {
        Self {
            role,
            text: dedent(raw),
        }
    }

    /// Byte length of the code text.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True when the block holds no code.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Remove trailing whitespace and the leading tabs/spaces common to all
/// non-empty lines.
pub fn dedent(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let indent = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);
    let start = lines.iter().position(|line| !line.is_empty()).unwrap_or(lines.len());
    lines[start..]
        .iter()
        .map(|line| if line.is_empty() { "" } else { &line[indent..] })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Attachment point of a code block, written in marker comments as
/// `role`, `device.role` or `device.PROPERTY.role`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodePath {
    Driver(DriverRole),
    Device {
        device: DeviceKind,
        role: DeviceRole,
    },
    Property {
        device: DeviceKind,
        property: String,
        role: PropertyRole,
    },
}

impl fmt::Display for CodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePath::Driver(role) => f.write_str(role.keyword()),
            CodePath::Device { device, role } => write!(f, "{}.{}", device, role.keyword()),
            CodePath::Property {
                device,
                property,
                role,
            } => write!(f, "{}.{}.{}", device, property, role.keyword()),
        }
    }
}

impl FromStr for CodePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let device = |keyword: &str| {
            DeviceKind::from_keyword(keyword).ok_or_else(|| format!("unknown device '{}'", keyword))
        };
        match parts.as_slice() {
            [role] => DriverRole::from_keyword(role)
                .map(CodePath::Driver)
                .ok_or_else(|| format!("unknown driver role '{}'", role)),
            [dev, role] => Ok(CodePath::Device {
                device: device(dev)?,
                role: DeviceRole::from_keyword(role)
                    .ok_or_else(|| format!("unknown device role '{}'", role))?,
            }),
            [dev, property, role] => Ok(CodePath::Property {
                device: device(dev)?,
                property: property.to_string(),
                role: PropertyRole::from_keyword(role)
                    .ok_or_else(|| format!("unknown property role '{}'", role))?,
            }),
            _ => Err(format!("malformed code path '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_naming() {
        let property = Property::new(PropertyKind::Switch, DeviceKind::Aux, "foo_bar");
        assert_eq!(property.id, "FOO_BAR");
        assert_eq!(property.handle, "FOO_BAR_PROPERTY");
        assert_eq!(property.name, "FOO_BAR_PROPERTY_NAME");
        assert_eq!(property.label, "\"foo_bar\"");
        assert_eq!(property.pointer(), "PRIVATE_DATA->foo_bar_property");
        assert_eq!(property.handler, "aux_foo_bar_handler");
        assert_eq!(property.group, "AUX_MAIN_GROUP");
        assert!(property.handle_change);
        assert!(property.asynchronous_change);
    }

    #[test]
    fn test_item_naming() {
        let item = Item::new(PropertyKind::Switch, "foo_bar");
        assert_eq!(item.id, "FOO_BAR");
        assert_eq!(item.handle, "FOO_BAR_ITEM");
        assert_eq!(item.name, "FOO_BAR_ITEM_NAME");
        assert_eq!(item.label, "\"foo_bar\"");
        assert_eq!(item.value, ItemValue::Switch("false".to_string()));
    }

    #[test]
    fn test_handler_prefix_not_doubled() {
        assert_eq!(default_handler(DeviceKind::Aux, "AUX_POWER_OUTLET"), "aux_power_outlet_handler");
        assert_eq!(default_handler(DeviceKind::Wheel, "X_SLOT"), "wheel_x_slot_handler");
    }

    #[test]
    fn test_light_defaults() {
        let property = Property::new(PropertyKind::Light, DeviceKind::Ccd, "status");
        assert_eq!(property.perm, RO_PERM);
        assert!(!property.handle_change);

        let item = Item::new(PropertyKind::Light, "busy");
        assert_eq!(item.handle, "BUSY_ITEM");
        assert_eq!(item.name, "BUSY_ITEM_NAME");
        assert_eq!(item.value, ItemValue::Light(IDLE_STATE.to_string()));
    }

    #[test]
    fn test_width() {
        let mut property = Property::new(PropertyKind::Number, DeviceKind::Focuser, "x");
        assert_eq!(property.width, "X_PROPERTY_NAME".len());
        property
            .items
            .push(Item::new(PropertyKind::Number, "a_rather_long_item_name"));
        assert_eq!(property.compute_width(), "A_RATHER_LONG_ITEM_NAME_ITEM_NAME".len());
    }

    #[test]
    fn test_dedent() {
        assert_eq!(dedent("\t\tif (x) {\n\t\t\ty();  \n\n\t\t}\n"), "if (x) {\n\ty();\n\n}");
        assert_eq!(dedent("\n  a\n b"), " a\nb");
        assert_eq!(dedent(""), "");
    }

    #[test]
    fn test_code_path_round_trip() {
        let paths = [
            "include",
            "on_shutdown",
            "aux.on_timer",
            "ccd.CCD_EXPOSURE.on_change",
        ];
        for text in paths {
            let path: CodePath = text.parse().unwrap();
            assert_eq!(path.to_string(), text);
        }
        assert_eq!(
            "wheel.WHEEL_SLOT.on_attach".parse::<CodePath>().unwrap(),
            CodePath::Property {
                device: DeviceKind::Wheel,
                property: "WHEEL_SLOT".to_string(),
                role: PropertyRole::OnAttach,
            }
        );
        assert!("toaster.on_timer".parse::<CodePath>().is_err());
        assert!("aux.on_fire".parse::<CodePath>().is_err());
    }

    #[test]
    fn test_device_defaults() {
        assert_eq!(Device::new(DeviceKind::Mount, 0).name, "DRIVER_LABEL");
        assert_eq!(
            Device::new(DeviceKind::Guider, 1).name,
            "DRIVER_LABEL \" (guider)\""
        );
        assert_eq!(Device::new(DeviceKind::Gps, 0).name_symbol(), "GPS_DEVICE_NAME");
    }
}
