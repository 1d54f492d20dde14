//! Parser for the driver definition DSL.
//!
//! Recursive descent with one token of lookahead. The lookahead is filled
//! lazily so that, right after `=` or an opening `{`, the lexer can be
//! switched into expression or code capture mode without a token already
//! being buffered.

use log::{debug, trace};

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{GeneratorError, Result};

/// Parser for driver definitions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pending: Option<Token<'a>>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            pending: None,
            depth: 0,
        }
    }

    /// Parse the entire driver definition.
    pub fn parse(&mut self) -> Result<Driver> {
        self.expect(TokenKind::Identifier, Some("driver"))?;
        let name = self.expect(TokenKind::Identifier, None)?;
        self.expect(TokenKind::LBrace, None)?;
        self.open_block(&format!("driver {}", name.text));

        let mut driver = Driver::new(name.text);
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            self.parse_driver_attr(&mut driver)?;
        }
        self.close_block();

        let trailing = self.peek()?;
        if trailing.kind != TokenKind::None {
            return Err(unexpected(&trailing, "expected end of input after driver block"));
        }

        driver.todos = self.lexer.take_todos();
        driver.update_virtual();
        if driver.devices.is_empty() {
            return Err(GeneratorError::semantic(format!(
                "no device defined in driver '{}'",
                driver.name
            )));
        }
        debug!(
            "parsed driver '{}': {} device(s), virtual = {}",
            driver.name,
            driver.devices.len(),
            driver.is_virtual
        );
        Ok(driver)
    }

    fn peek(&mut self) -> Result<Token<'a>> {
        if let Some(token) = self.pending {
            return Ok(token);
        }
        let token = self.lexer.next_token()?;
        self.pending = Some(token);
        Ok(token)
    }

    /// Consume the next token only if it has the given kind (and text).
    fn match_token(&mut self, kind: TokenKind, text: Option<&str>) -> Result<Option<Token<'a>>> {
        let token = self.peek()?;
        if token.kind == kind && text.map_or(true, |text| token.text == text) {
            self.pending = None;
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    fn expect(&mut self, kind: TokenKind, text: Option<&str>) -> Result<Token<'a>> {
        if let Some(token) = self.match_token(kind, text)? {
            return Ok(token);
        }
        let token = self.peek()?;
        let message = match text {
            Some(text) => format!("expected '{}'", text),
            None => format!("expected {}", kind.describe()),
        };
        Err(unexpected(&token, &message))
    }

    fn open_block(&mut self, header: &str) {
        debug!("{:indent$}{} {{", "", header, indent = self.depth * 2);
        self.depth += 1;
    }

    fn close_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        debug!("{:indent$}}}", "", indent = self.depth * 2);
    }

    fn trace_attr(&self, name: &str, value: &dyn std::fmt::Display) {
        trace!("{:indent$}{} = {}", "", name, value, indent = self.depth * 2);
    }

    /// `= expression ;`
    fn expression(&mut self, name: &Token<'a>) -> Result<String> {
        self.expect(TokenKind::Equals, None)?;
        debug_assert!(self.pending.is_none());
        let value = self.lexer.capture_expression()?;
        if value.text.is_empty() {
            return Err(GeneratorError::syntax(
                value.line,
                value.column,
                format!("expected value for '{}'", name.text),
                None,
            ));
        }
        self.expect(TokenKind::Semicolon, None)?;
        self.trace_attr(name.text, &value.text);
        Ok(value.text.to_string())
    }

    /// `= true|false ;`
    fn boolean(&mut self, name: &Token<'a>) -> Result<bool> {
        self.expect(TokenKind::Equals, None)?;
        let value = if self.match_token(TokenKind::True, None)?.is_some() {
            true
        } else if self.match_token(TokenKind::False, None)?.is_some() {
            false
        } else {
            let token = self.peek()?;
            return Err(unexpected(&token, "expected 'true' or 'false'"));
        };
        self.expect(TokenKind::Semicolon, None)?;
        self.trace_attr(name.text, &value);
        Ok(value)
    }

    /// `{ code }`
    fn code(&mut self, name: &Token<'a>) -> Result<String> {
        self.expect(TokenKind::LBrace, None)?;
        debug_assert!(self.pending.is_none());
        let code = self.lexer.capture_code()?;
        self.expect(TokenKind::RBrace, None)?;
        trace!(
            "{:indent$}{} {{ {} bytes }}",
            "",
            name.text,
            code.text.len(),
            indent = self.depth * 2
        );
        Ok(code.text.to_string())
    }

    fn parse_driver_attr(&mut self, driver: &mut Driver) -> Result<()> {
        let name = self.expect(TokenKind::Identifier, None)?;
        match name.text {
            "label" | "author" | "copyright" => {
                self.expect(TokenKind::Equals, None)?;
                let value = self.expect(TokenKind::String, None)?;
                self.expect(TokenKind::Semicolon, None)?;
                self.trace_attr(name.text, &value.text);
                let target = match name.text {
                    "label" => &mut driver.label,
                    "author" => &mut driver.author,
                    _ => &mut driver.copyright,
                };
                *target = value.text.to_string();
            }
            "version" => {
                self.expect(TokenKind::Equals, None)?;
                let value = self.expect(TokenKind::Number, None)?;
                driver.version = value
                    .text
                    .parse()
                    .map_err(|_| unexpected(&value, "expected non-negative integer version"))?;
                self.expect(TokenKind::Semicolon, None)?;
                self.trace_attr(name.text, &driver.version);
            }
            "serial" => {
                if driver.serial.is_some() {
                    return Err(unexpected(&name, "duplicate 'serial' block"));
                }
                driver.serial = Some(self.parse_serial()?);
            }
            "libusb" => {
                if driver.usb.is_some() {
                    return Err(unexpected(&name, "duplicate 'libusb' block"));
                }
                driver.usb = Some(self.parse_usb()?);
            }
            keyword => {
                if let Some(role) = DriverRole::from_keyword(keyword) {
                    if driver.code(role).is_some() {
                        return Err(unexpected(&name, &format!("duplicate '{}' block", keyword)));
                    }
                    let code = self.code(&name)?;
                    driver.code.push(CodeBlock::new(role, &code));
                } else if let Some(kind) = DeviceKind::from_keyword(keyword) {
                    if driver.device(kind).is_some() {
                        return Err(GeneratorError::semantic(format!(
                            "device '{}' defined more than once",
                            kind
                        )));
                    }
                    let device = self.parse_device(kind, driver.devices.len())?;
                    driver.devices.push(device);
                } else {
                    let value = self.expression(&name)?;
                    driver.definitions.push(Definition {
                        name: keyword.to_string(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    fn parse_serial(&mut self) -> Result<SerialTransport> {
        let mut serial = SerialTransport::default();
        self.expect(TokenKind::LBrace, None)?;
        self.open_block("serial");
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            let name = self.expect(TokenKind::Identifier, None)?;
            match name.text {
                "configurable_speed" => serial.configurable_speed = self.boolean(&name)?,
                "pattern" => serial.patterns.push(self.parse_pattern()?),
                _ => return Err(unexpected(&name, "unknown serial attribute")),
            }
        }
        self.close_block();
        Ok(serial)
    }

    fn parse_pattern(&mut self) -> Result<SerialPattern> {
        let mut pattern = SerialPattern::default();
        self.expect(TokenKind::LBrace, None)?;
        self.open_block("pattern");
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            let name = self.expect(TokenKind::Identifier, None)?;
            if name.text == "exact_match" {
                pattern.exact_match = self.boolean(&name)?;
                continue;
            }
            let value = self.expression(&name)?;
            let target = match name.text {
                "product_id" => &mut pattern.product_id,
                "vendor_id" => &mut pattern.vendor_id,
                "product_string" => &mut pattern.product_string,
                "vendor_string" => &mut pattern.vendor_string,
                "serial_string" => &mut pattern.serial_string,
                _ => return Err(unexpected(&name, "unknown pattern attribute")),
            };
            *target = Some(value);
        }
        self.close_block();
        Ok(pattern)
    }

    fn parse_usb(&mut self) -> Result<UsbTransport> {
        let mut usb = UsbTransport::default();
        self.expect(TokenKind::LBrace, None)?;
        self.open_block("libusb");
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            let name = self.expect(TokenKind::Identifier, None)?;
            if name.text == "hotplug" {
                usb.hotplug = self.boolean(&name)?;
                continue;
            }
            let value = self.expression(&name)?;
            match name.text {
                "vendor_id" => usb.vendor_id = Some(value),
                "product_id" => usb.product_id = Some(value),
                _ => return Err(unexpected(&name, "unknown libusb attribute")),
            }
        }
        self.close_block();
        Ok(usb)
    }

    fn parse_device(&mut self, kind: DeviceKind, index: usize) -> Result<Device> {
        let mut device = Device::new(kind, index);
        if self.match_token(TokenKind::Semicolon, None)?.is_some() {
            debug!("{:indent$}{};", "", kind, indent = self.depth * 2);
            return Ok(device);
        }
        self.expect(TokenKind::LBrace, None)?;
        self.open_block(kind.keyword());
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            let name = self.expect(TokenKind::Identifier, None)?;
            if name.text == "additional_instances" {
                device.additional_instances = self.boolean(&name)?;
            } else if let Some(role) = DeviceRole::from_keyword(name.text) {
                if device.code(role).is_some() {
                    return Err(unexpected(&name, &format!("duplicate '{}' block", name.text)));
                }
                let code = self.code(&name)?;
                device.code.push(CodeBlock::new(role, &code));
            } else if let Some(property_kind) = PropertyKind::from_keyword(name.text) {
                let property = self.parse_property(property_kind, kind)?;
                if device.property(&property.id).is_some() {
                    return Err(GeneratorError::semantic(format!(
                        "property '{}' of device '{}' defined more than once",
                        property.id, kind
                    )));
                }
                for item in &property.items {
                    let taken = device
                        .properties
                        .iter()
                        .flat_map(|other| &other.items)
                        .any(|other| other.handle == item.handle);
                    if taken {
                        return Err(GeneratorError::semantic(format!(
                            "item handle '{}' of property '{}' already used in device '{}'",
                            item.handle, property.id, kind
                        )));
                    }
                }
                device.properties.push(property);
            } else {
                let value = self.expression(&name)?;
                match name.text {
                    "name" => device.name = value,
                    "interface" => device.interface = value,
                    _ => return Err(unexpected(&name, "unknown device attribute")),
                }
            }
        }
        self.close_block();
        Ok(device)
    }

    fn parse_property(&mut self, kind: PropertyKind, device: DeviceKind) -> Result<Property> {
        let ident = self.expect(TokenKind::Identifier, None)?;
        let mut property = Property::new(kind, device, ident.text);
        let mut handle_change = None;

        if self.match_token(TokenKind::Semicolon, None)?.is_none() {
            self.expect(TokenKind::LBrace, None)?;
            self.open_block(&format!("{} {}", kind.keyword(), ident.text));
            while self.match_token(TokenKind::RBrace, None)?.is_none() {
                let name = self.expect(TokenKind::Identifier, None)?;
                match name.text {
                    "item" => {
                        if kind == PropertyKind::Inherited {
                            return Err(unexpected(&name, "inherited property cannot declare items"));
                        }
                        let item = self.parse_item(&property)?;
                        if property.items.iter().any(|other| other.id == item.id) {
                            return Err(GeneratorError::semantic(format!(
                                "item '{}' of property '{}' defined more than once",
                                item.id, property.id
                            )));
                        }
                        property.items.push(item);
                    }
                    "handle_change" => handle_change = Some(self.boolean(&name)?),
                    "asynchronous_change" => property.asynchronous_change = self.boolean(&name)?,
                    "persistent" => property.persistent = self.boolean(&name)?,
                    "preserve_values" => property.preserve_values = self.boolean(&name)?,
                    "always_defined" => property.always_defined = self.boolean(&name)?,
                    keyword => {
                        if let Some(role) = PropertyRole::from_keyword(keyword) {
                            if property.code(role).is_some() {
                                return Err(unexpected(&name, &format!("duplicate '{}' block", keyword)));
                            }
                            let code = self.code(&name)?;
                            property.code.push(CodeBlock::new(role, &code));
                        } else {
                            let value = self.expression(&name)?;
                            self.apply_property_attr(&mut property, &name, value)?;
                        }
                    }
                }
            }
            self.close_block();
        } else {
            debug!("{:indent$}{} {};", "", kind.keyword(), ident.text, indent = self.depth * 2);
        }

        property.handle_change = handle_change.unwrap_or_else(|| property.default_handle_change());
        property.width = property.compute_width();
        Ok(property)
    }

    fn apply_property_attr(&self, property: &mut Property, name: &Token<'a>, value: String) -> Result<()> {
        match name.text {
            "label" => property.label = value,
            "handle" => property.handle = value,
            "name" => match unquote(&value) {
                Some(wire_name) => property.wire_name = Some(wire_name.to_string()),
                None => {
                    property.name = value;
                    property.wire_name = None;
                }
            },
            "handler" => property.handler = value,
            "hidden" => property.hidden = Some(value),
            "perm" => property.perm = value,
            "rule" => property.rule = value,
            "group" => property.group = value,
            "pointer" => property.pointer = Some(value),
            _ => return Err(unexpected(name, "unknown property attribute")),
        }
        Ok(())
    }

    fn parse_item(&mut self, property: &Property) -> Result<Item> {
        let ident = self.expect(TokenKind::Identifier, None)?;
        let mut item = Item::new(property.kind, ident.text);
        if self.match_token(TokenKind::Semicolon, None)?.is_some() {
            debug!("{:indent$}item {};", "", ident.text, indent = self.depth * 2);
            return Ok(item);
        }
        self.expect(TokenKind::LBrace, None)?;
        self.open_block(&format!("item {}", ident.text));
        while self.match_token(TokenKind::RBrace, None)?.is_none() {
            let name = self.expect(TokenKind::Identifier, None)?;
            let value = self.expression(&name)?;
            match (name.text, &mut item.value) {
                ("label", _) => item.label = value,
                ("handle", _) => item.handle = value,
                ("name", _) => match unquote(&value) {
                    Some(wire_name) => item.wire_name = Some(wire_name.to_string()),
                    None => {
                        item.name = value;
                        item.wire_name = None;
                    }
                },
                ("value", ItemValue::Text(target))
                | ("value", ItemValue::Switch(target))
                | ("value", ItemValue::Light(target))
                | ("value", ItemValue::Number { value: target, .. })
                | ("min", ItemValue::Number { min: target, .. })
                | ("max", ItemValue::Number { max: target, .. })
                | ("step", ItemValue::Number { step: target, .. }) => *target = value,
                ("format", ItemValue::Number { format, .. }) => *format = Some(value),
                ("min" | "max" | "step" | "format", _) => {
                    return Err(unexpected(
                        &name,
                        &format!("'{}' only applies to items of number properties", name.text),
                    ));
                }
                _ => return Err(unexpected(&name, "unknown item attribute")),
            }
        }
        self.close_block();
        Ok(item)
    }
}

/// Strip surrounding double quotes, if present.
fn unquote(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
}

fn unexpected(token: &Token<'_>, message: &str) -> GeneratorError {
    let text = match token.kind {
        TokenKind::None => None,
        _ => Some(token.text),
    };
    GeneratorError::syntax(token.line, token.column, message, text)
}
