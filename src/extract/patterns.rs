//! Line shapes recognised by the extractor.
//!
//! Every pattern is matched against a line with its indentation removed,
//! except the code markers, whose indentation is needed to restore the
//! relative indentation of the relocated code.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref SECTION: Regex = Regex::new(r"^#pragma mark - (.+?)\s*$").unwrap();
    pub static ref DEVICE_SECTION: Regex =
        Regex::new(r"^(High level code|Device API) \((\w+)\)$").unwrap();
    pub static ref MARKER_OPEN: Regex = Regex::new(r"^(\s*)//\+ (\S+)\s*$").unwrap();
    pub static ref MARKER_CLOSE: Regex = Regex::new(r"^\s*//- (\S+)\s*$").unwrap();

    pub static ref AUTHOR: Regex = Regex::new(r"^// 3\.0 by (.*)$").unwrap();
    pub static ref INCLUDE: Regex = Regex::new(r"^#include <(.+)>$").unwrap();
    pub static ref DEFINE: Regex = Regex::new(r"^#define\s+(\w+)\s+(.*?)\s*$").unwrap();
    pub static ref VERSION: Regex = Regex::new(r"^0x0300([0-9A-Fa-f]+)$").unwrap();

    pub static ref AUX_ATTACH: Regex = Regex::new(
        r"^if \(indigo_aux_attach\(device, DRIVER_NAME, DRIVER_VERSION, (.+)\) == INDIGO_OK\) \{$"
    )
    .unwrap();
    pub static ref PROPERTY_INIT: Regex =
        Regex::new(r"^(\w+) = indigo_init_(text|number|switch|light)_property\((.*)\);$").unwrap();
    pub static ref ITEM_INIT: Regex =
        Regex::new(r"^indigo_init_(text|number|switch|light)_item\((.*)\);$").unwrap();
    pub static ref NUMBER_FORMAT: Regex =
        Regex::new(r"^strcpy\((\w+)->number\.format, (.+)\);$").unwrap();
    pub static ref HIDDEN: Regex = Regex::new(r"^(\w+)->hidden = (.+);$").unwrap();

    pub static ref DEFINE_MATCHING: Regex =
        Regex::new(r"^INDIGO_DEFINE_MATCHING_PROPERTY\((\w+)\);$").unwrap();
    pub static ref MATCH_CHANGEABLE: Regex = Regex::new(
        r"^(?:\} else )?if \(indigo_property_match_changeable\((\w+), property\)\) \{$"
    )
    .unwrap();
    pub static ref PROCESS_CHANGE: Regex =
        Regex::new(r"^INDIGO_COPY_VALUES_PROCESS_CHANGE\((\w+), (\w+)\);$").unwrap();
    pub static ref COPY_VALUES: Regex =
        Regex::new(r"^indigo_property_copy_values\((\w+), property, false\);$").unwrap();
    pub static ref COPY_TARGETS: Regex =
        Regex::new(r"^indigo_property_copy_targets\((\w+), property, false\);$").unwrap();
    pub static ref EXECUTE_HANDLER: Regex =
        Regex::new(r"^indigo_execute_handler\(device, (\w+)\);$").unwrap();
    pub static ref CALL_HANDLER: Regex = Regex::new(r"^(\w+)\(device\);$").unwrap();
    pub static ref SAVE_PROPERTY: Regex =
        Regex::new(r"^indigo_save_property\(device, NULL, (\w+)\);$").unwrap();

    pub static ref PATTERN_STRING: Regex =
        Regex::new(r"^strcpy\(patterns\[(\d+)\]\.(\w+), (.+)\);$").unwrap();
    pub static ref PATTERN_FIELD: Regex =
        Regex::new(r"^patterns\[(\d+)\]\.(\w+) = (.+);$").unwrap();
    pub static ref HOTPLUG_REGISTER: Regex =
        Regex::new(r"^int rc = libusb_hotplug_register_callback\((.*)\);$").unwrap();
}

/// Split a C argument list at top-level commas. Commas nested in brackets
/// or inside string and character literals do not split.
pub fn split_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in args.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args("NULL, device->name, FOO_PROPERTY_NAME, \"a, b\", f(1, 2), 3"),
            ["NULL", "device->name", "FOO_PROPERTY_NAME", "\"a, b\"", "f(1, 2)", "3"]
        );
        assert_eq!(split_args("'\\'', x[1,2]"), ["'\\''", "x[1,2]"]);
        assert!(split_args("").is_empty());
    }

    #[test]
    fn test_property_init_shape() {
        let line = "POWER_PROPERTY = indigo_init_switch_property(NULL, device->name, POWER_PROPERTY_NAME, AUX_MAIN_GROUP, \"power\", INDIGO_OK_STATE, INDIGO_RW_PERM, INDIGO_ONE_OF_MANY_RULE, 2);";
        let captures = PROPERTY_INIT.captures(line).unwrap();
        assert_eq!(&captures[1], "POWER_PROPERTY");
        assert_eq!(&captures[2], "switch");
        assert_eq!(split_args(&captures[3]).len(), 9);
    }

    #[test]
    fn test_markers() {
        let captures = MARKER_OPEN.captures("\t\t//+ aux.POWER.on_attach").unwrap();
        assert_eq!(&captures[1], "\t\t");
        assert_eq!(&captures[2], "aux.POWER.on_attach");
        assert!(MARKER_CLOSE.is_match("\t\t//- aux.POWER.on_attach"));
        assert!(!MARKER_OPEN.is_match("// plain comment"));
    }

    #[test]
    fn test_dispatch_shapes() {
        assert!(MATCH_CHANGEABLE.is_match("} else if (indigo_property_match_changeable(X_PROPERTY, property)) {"));
        assert!(MATCH_CHANGEABLE.is_match("if (indigo_property_match_changeable(CONNECTION_PROPERTY, property)) {"));
        let captures = PROCESS_CHANGE
            .captures("INDIGO_COPY_VALUES_PROCESS_CHANGE(X_PROPERTY, aux_x_handler);")
            .unwrap();
        assert_eq!(&captures[2], "aux_x_handler");
        assert!(!CALL_HANDLER.is_match("indigo_update_property(device, X_PROPERTY, NULL);"));
    }
}
