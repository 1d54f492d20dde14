//! Per-device code: timer, connection and change handlers, and the four
//! device API callbacks.

use log::warn;

use super::writer::SourceWriter;
use crate::dsl::{
    CodePath, Device, DeviceKind, DeviceRole, Driver, ItemValue, Property, PropertyKind,
    PropertyRole,
};

fn device_block(w: &mut SourceWriter, device: &Device, role: DeviceRole, padded: bool) {
    if let Some(block) = device.code(role) {
        let path = CodePath::Device {
            device: device.kind,
            role,
        };
        w.code_block(&path, &block.text, padded);
        if padded {
            w.blank();
        }
    }
}

fn property_block(w: &mut SourceWriter, property: &Property, role: PropertyRole, padded: bool) {
    if let Some(block) = property.code(role) {
        let path = CodePath::Property {
            device: property.device,
            property: property.id.clone(),
            role,
        };
        w.code_block(&path, &block.text, padded);
        if padded {
            w.blank();
        }
    }
}

/// Properties created and released by the device itself.
fn owned(device: &Device) -> impl Iterator<Item = &Property> {
    device
        .properties
        .iter()
        .filter(|property| property.kind != PropertyKind::Inherited)
}

/// Owned properties defined on connect and deleted on disconnect.
fn connected_only(device: &Device) -> impl Iterator<Item = &Property> {
    owned(device).filter(|property| !property.always_defined)
}

fn handled(device: &Device) -> impl Iterator<Item = &Property> {
    device.properties.iter().filter(|property| property.handle_change)
}

/// Timer callback, connection handler and property change handlers.
pub fn high_level_code(w: &mut SourceWriter, driver: &Driver, device: &Device) {
    let prefix = device.kind.keyword();
    w.section(format!("High level code ({})", prefix));
    device_block(w, device, DeviceRole::Code, true);

    if let Some(block) = device.code(DeviceRole::OnTimer) {
        w.heading(format!("{} state checking timer callback", prefix));
        w.open(format!("static void {}_timer_callback(indigo_device *device) {{", prefix));
        w.open("if (!IS_CONNECTED) {");
        w.line("return;");
        w.close("}");
        w.line("pthread_mutex_lock(&PRIVATE_DATA->mutex);");
        let path = CodePath::Device {
            device: device.kind,
            role: DeviceRole::OnTimer,
        };
        w.code_block(&path, &block.text, false);
        w.line("pthread_mutex_unlock(&PRIVATE_DATA->mutex);");
        w.close("}");
        w.blank();
    }

    connection_handler(w, driver, device);

    for property in &device.properties {
        property_block(w, property, PropertyRole::Code, true);
        if property.handle_change {
            change_handler(w, property);
        } else if property.code(PropertyRole::OnChange).is_some() {
            warn!(
                "{}.{}: on_change code dropped, the property does not handle changes",
                device.kind, property.id
            );
        }
    }
}

fn connection_handler(w: &mut SourceWriter, driver: &Driver, device: &Device) {
    let prefix = device.kind.keyword();
    let shared = driver.devices.len() > 1;
    let serial = driver.serial.is_some();

    w.heading("CONNECTION change handler");
    w.open(format!("static void {}_connection_handler(indigo_device *device) {{", prefix));
    w.line("indigo_lock_master_device(device);");
    w.open("if (CONNECTION_CONNECTED_ITEM->sw.value) {");
    w.line("pthread_mutex_lock(&PRIVATE_DATA->mutex);");
    w.line("bool connection_result = true;");
    if !driver.is_virtual {
        if shared {
            w.open("if (PRIVATE_DATA->count++ == 0) {");
            w.line(format!("connection_result = {}_open(device);", driver.name));
            w.close("}");
        } else {
            w.line(format!("connection_result = {}_open(device);", driver.name));
        }
    }
    w.open("if (connection_result) {");
    device_block(w, device, DeviceRole::OnConnect, false);
    for property in connected_only(device) {
        w.line(format!("indigo_define_property(device, {}, NULL);", property.handle));
    }
    if device.code(DeviceRole::OnTimer).is_some() {
        w.line(format!("indigo_execute_handler(device, {}_timer_callback);", prefix));
    }
    w.line("CONNECTION_PROPERTY->state = INDIGO_OK_STATE;");
    if serial {
        w.line(format!(
            "indigo_send_message(device, \"Connected to %s on %s\", {}, DEVICE_PORT_ITEM->text.value);",
            device.name_symbol()
        ));
    } else {
        w.line("indigo_send_message(device, \"Connected to %s\", device->name);");
    }
    w.reopen("} else {");
    if serial {
        w.line(format!(
            "indigo_send_message(device, \"Failed to connect to %s on %s\", {}, DEVICE_PORT_ITEM->text.value);",
            device.name_symbol()
        ));
    } else {
        w.line("indigo_send_message(device, \"Failed to connect to %s\", device->name);");
    }
    if shared && !driver.is_virtual {
        w.line("PRIVATE_DATA->count--;");
    }
    w.line("CONNECTION_PROPERTY->state = INDIGO_ALERT_STATE;");
    w.line("indigo_set_switch(CONNECTION_PROPERTY, CONNECTION_DISCONNECTED_ITEM, true);");
    w.close("}");
    w.line("pthread_mutex_unlock(&PRIVATE_DATA->mutex);");
    w.reopen("} else {");
    w.line("indigo_cancel_pending_handlers(device);");
    w.line("pthread_mutex_lock(&PRIVATE_DATA->mutex);");
    for property in connected_only(device) {
        w.line(format!("indigo_delete_property(device, {}, NULL);", property.handle));
    }
    device_block(w, device, DeviceRole::OnDisconnect, false);
    if !driver.is_virtual {
        if shared {
            w.open("if (--PRIVATE_DATA->count == 0) {");
            w.line(format!("{}_close(device);", driver.name));
            w.close("}");
        } else {
            w.line(format!("{}_close(device);", driver.name));
        }
    }
    w.line("indigo_send_message(device, \"Disconnected from %s\", device->name);");
    w.line("CONNECTION_PROPERTY->state = INDIGO_OK_STATE;");
    w.line("pthread_mutex_unlock(&PRIVATE_DATA->mutex);");
    w.close("}");
    w.line(format!(
        "indigo_{}_change_property(device, NULL, CONNECTION_PROPERTY);",
        prefix
    ));
    w.line("indigo_unlock_master_device(device);");
    w.close("}");
    w.blank();
}

fn change_handler(w: &mut SourceWriter, property: &Property) {
    w.heading(format!("{} change handler", property.id));
    w.open(format!("static void {}(indigo_device *device) {{", property.handler));
    w.line("pthread_mutex_lock(&PRIVATE_DATA->mutex);");
    w.line(format!("{}->state = INDIGO_OK_STATE;", property.handle));
    property_block(w, property, PropertyRole::OnChange, false);
    w.line(format!("indigo_update_property(device, {}, NULL);", property.handle));
    w.line("pthread_mutex_unlock(&PRIVATE_DATA->mutex);");
    w.close("}");
    w.blank();
}

/// The attach, enumerate, change property and detach callbacks.
pub fn device_api(w: &mut SourceWriter, driver: &Driver, device: &Device) {
    let prefix = device.kind.keyword();
    w.section(format!("Device API ({})", prefix));
    w.line(format!(
        "static indigo_result {}_enumerate_properties(indigo_device *device, indigo_client *client, indigo_property *property);",
        prefix
    ));
    w.blank();
    attach(w, driver, device);
    enumerate(w, device);
    change_property(w, device);
    detach(w, device);
}

fn attach(w: &mut SourceWriter, driver: &Driver, device: &Device) {
    let prefix = device.kind.keyword();
    w.heading(format!("{} attach API callback", prefix));
    w.open(format!("static indigo_result {}_attach(indigo_device *device) {{", prefix));
    if device.kind == DeviceKind::Aux {
        w.open(format!(
            "if (indigo_aux_attach(device, DRIVER_NAME, DRIVER_VERSION, {}) == INDIGO_OK) {{",
            device.interface
        ));
    } else {
        w.open(format!(
            "if (indigo_{}_attach(device, DRIVER_NAME, DRIVER_VERSION) == INDIGO_OK) {{",
            prefix
        ));
    }
    if device.additional_instances {
        w.line("ADDITIONAL_INSTANCES_PROPERTY->hidden = DEVICE_CONTEXT->base_device != NULL;");
    }
    if let Some(serial) = &driver.serial {
        w.line("DEVICE_PORT_PROPERTY->hidden = false;");
        w.line("DEVICE_PORTS_PROPERTY->hidden = false;");
        if serial.configurable_speed {
            w.line("DEVICE_BAUDRATE_PROPERTY->hidden = false;");
        }
        w.line("indigo_enumerate_serial_ports(device, DEVICE_PORTS_PROPERTY);");
    }
    device_block(w, device, DeviceRole::OnAttach, false);
    for property in &device.properties {
        init_property(w, property);
        property_block(w, property, PropertyRole::OnAttach, false);
    }
    w.line("INDIGO_DEVICE_ATTACH_LOG(DRIVER_NAME, device->name);");
    w.line(format!("return {}_enumerate_properties(device, NULL, NULL);", prefix));
    w.close("}");
    w.line("return INDIGO_FAILED;");
    w.close("}");
    w.blank();
}

fn init_property(w: &mut SourceWriter, property: &Property) {
    let handle = &property.handle;
    let count = property.items.len();
    let init = match property.kind {
        PropertyKind::Inherited => {
            let hidden = property.hidden.as_deref().unwrap_or("false");
            w.line(format!("{}->hidden = {};", handle, hidden));
            return;
        }
        PropertyKind::Text | PropertyKind::Number => format!(
            "indigo_init_{}_property(NULL, device->name, {}, {}, {}, INDIGO_OK_STATE, {}, {})",
            property.kind.keyword(),
            property.name,
            property.group,
            property.label,
            property.perm,
            count
        ),
        PropertyKind::Switch => format!(
            "indigo_init_switch_property(NULL, device->name, {}, {}, {}, INDIGO_OK_STATE, {}, {}, {})",
            property.name, property.group, property.label, property.perm, property.rule, count
        ),
        PropertyKind::Light => format!(
            "indigo_init_light_property(NULL, device->name, {}, {}, {}, INDIGO_OK_STATE, {})",
            property.name, property.group, property.label, count
        ),
    };
    w.line(format!("{} = {};", handle, init));
    w.open(format!("if ({} == NULL) {{", handle));
    w.line("return INDIGO_FAILED;");
    w.close("}");
    for item in &property.items {
        match &item.value {
            ItemValue::Number {
                min,
                max,
                step,
                value,
                format,
            } => {
                w.line(format!(
                    "indigo_init_number_item({}, {}, {}, {}, {}, {}, {});",
                    item.handle, item.name, item.label, min, max, step, value
                ));
                if let Some(format) = format {
                    w.line(format!("strcpy({}->number.format, {});", item.handle, format));
                }
            }
            ItemValue::Text(value) | ItemValue::Switch(value) | ItemValue::Light(value) => {
                let kind = match &item.value {
                    ItemValue::Text(_) => "text",
                    ItemValue::Switch(_) => "switch",
                    _ => "light",
                };
                w.line(format!(
                    "indigo_init_{}_item({}, {}, {}, {});",
                    kind, item.handle, item.name, item.label, value
                ));
            }
        }
    }
    if let Some(hidden) = &property.hidden {
        w.line(format!("{}->hidden = {};", handle, hidden));
    }
}

fn enumerate(w: &mut SourceWriter, device: &Device) {
    let prefix = device.kind.keyword();
    w.heading(format!("{} enumerate API callback", prefix));
    w.open(format!(
        "static indigo_result {}_enumerate_properties(indigo_device *device, indigo_client *client, indigo_property *property) {{",
        prefix
    ));
    if connected_only(device).next().is_some() {
        w.open("if (IS_CONNECTED) {");
        for property in connected_only(device) {
            w.line(format!("INDIGO_DEFINE_MATCHING_PROPERTY({});", property.handle));
        }
        w.close("}");
    }
    for property in owned(device).filter(|property| property.always_defined) {
        w.line(format!("INDIGO_DEFINE_MATCHING_PROPERTY({});", property.handle));
    }
    w.line(format!(
        "return indigo_{}_enumerate_properties(device, client, property);",
        prefix
    ));
    w.close("}");
    w.blank();
}

fn change_property(w: &mut SourceWriter, device: &Device) {
    let prefix = device.kind.keyword();
    w.heading(format!("{} change property API callback", prefix));
    w.open(format!(
        "static indigo_result {}_change_property(indigo_device *device, indigo_client *client, indigo_property *property) {{",
        prefix
    ));
    w.open("if (indigo_property_match_changeable(CONNECTION_PROPERTY, property)) {");
    w.open("if (!indigo_ignore_connection_change(device, property)) {");
    w.line("indigo_property_copy_values(CONNECTION_PROPERTY, property, false);");
    w.line("CONNECTION_PROPERTY->state = INDIGO_BUSY_STATE;");
    w.line("indigo_update_property(device, CONNECTION_PROPERTY, NULL);");
    w.line(format!("indigo_execute_handler(device, {}_connection_handler);", prefix));
    w.close("}");
    w.line("return INDIGO_OK;");

    for property in handled(device) {
        let handle = &property.handle;
        let handler = &property.handler;
        w.reopen(format!(
            "}} else if (indigo_property_match_changeable({}, property)) {{",
            handle
        ));
        if property.preserve_values {
            w.line(format!("indigo_property_copy_targets({}, property, false);", handle));
            w.line(format!("{}->state = INDIGO_BUSY_STATE;", handle));
            w.line(format!("indigo_update_property(device, {}, NULL);", handle));
            if property.asynchronous_change {
                w.line(format!("indigo_execute_handler(device, {});", handler));
            } else {
                w.line(format!("{}(device);", handler));
            }
        } else if property.asynchronous_change {
            w.line(format!("INDIGO_COPY_VALUES_PROCESS_CHANGE({}, {});", handle, handler));
        } else {
            w.line(format!("indigo_property_copy_values({}, property, false);", handle));
            w.line(format!("{}->state = INDIGO_BUSY_STATE;", handle));
            w.line(format!("{}(device);", handler));
        }
        w.line("return INDIGO_OK;");
    }

    let persistent: Vec<&Property> = device
        .properties
        .iter()
        .filter(|property| property.persistent)
        .collect();
    if !persistent.is_empty() {
        w.reopen("} else if (indigo_property_match_changeable(CONFIG_PROPERTY, property)) {");
        w.open("if (indigo_switch_match(CONFIG_SAVE_ITEM, property)) {");
        for property in persistent {
            w.line(format!("indigo_save_property(device, NULL, {});", property.handle));
        }
        w.close("}");
    }
    w.close("}");
    w.line(format!(
        "return indigo_{}_change_property(device, client, property);",
        prefix
    ));
    w.close("}");
    w.blank();
}

fn detach(w: &mut SourceWriter, device: &Device) {
    let prefix = device.kind.keyword();
    w.heading(format!("{} detach API callback", prefix));
    w.open(format!("static indigo_result {}_detach(indigo_device *device) {{", prefix));
    w.open("if (IS_CONNECTED) {");
    w.line("indigo_set_switch(CONNECTION_PROPERTY, CONNECTION_DISCONNECTED_ITEM, true);");
    w.line(format!("{}_connection_handler(device);", prefix));
    w.close("}");
    device_block(w, device, DeviceRole::OnDetach, false);
    for property in &device.properties {
        property_block(w, property, PropertyRole::OnDetach, false);
    }
    for property in owned(device) {
        w.line(format!("indigo_release_property({});", property.handle));
    }
    w.line("INDIGO_DEVICE_DETACH_LOG(DRIVER_NAME, device->name);");
    w.line(format!("return indigo_{}_detach(device);", prefix));
    w.close("}");
    w.blank();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn device_code(input: &str) -> String {
        let driver = parse(input).unwrap();
        let mut w = SourceWriter::new();
        for device in &driver.devices {
            high_level_code(&mut w, &driver, device);
            device_api(&mut w, &driver, device);
        }
        w.finish()
    }

    #[test]
    fn test_persistent_property_is_saved() {
        let text = device_code(
            "driver foo { aux {
                switch power { persistent = true; item on; }
                switch mode { item a; item b; }
            } }",
        );
        let config = text
            .find("indigo_property_match_changeable(CONFIG_PROPERTY, property)")
            .unwrap();
        let branch = &text[config..];
        assert!(branch.contains(
            "\t\tif (indigo_switch_match(CONFIG_SAVE_ITEM, property)) {\n\t\t\tindigo_save_property(device, NULL, POWER_PROPERTY);\n\t\t}\n"
        ));
        assert!(!text.contains("indigo_save_property(device, NULL, MODE_PROPERTY);"));
    }

    #[test]
    fn test_no_config_branch_without_persistent_properties() {
        let text = device_code("driver foo { aux { switch mode { item a; } } }");
        assert!(!text.contains("CONFIG_PROPERTY"));
        assert!(text.contains(
            "\t} else if (indigo_property_match_changeable(MODE_PROPERTY, property)) {\n\t\tINDIGO_COPY_VALUES_PROCESS_CHANGE(MODE_PROPERTY, aux_mode_handler);\n\t\treturn INDIGO_OK;\n\t}\n\treturn indigo_aux_change_property(device, client, property);\n"
        ));
    }

    #[test]
    fn test_dispatch_forms() {
        let text = device_code(
            "driver foo { focuser {
                number sync { asynchronous_change = false; item value; }
                number preserved { preserve_values = true; item value; }
                number preserved_sync { preserve_values = true; asynchronous_change = false; item value; }
                light status { item ok; }
            } }",
        );
        assert!(text.contains(
            "\t\tindigo_property_copy_values(SYNC_PROPERTY, property, false);\n\t\tSYNC_PROPERTY->state = INDIGO_BUSY_STATE;\n\t\tfocuser_sync_handler(device);\n"
        ));
        assert!(text.contains(
            "\t\tindigo_property_copy_targets(PRESERVED_PROPERTY, property, false);\n\t\tPRESERVED_PROPERTY->state = INDIGO_BUSY_STATE;\n\t\tindigo_update_property(device, PRESERVED_PROPERTY, NULL);\n\t\tindigo_execute_handler(device, focuser_preserved_handler);\n"
        ));
        assert!(text.contains("\t\tfocuser_preserved_sync_handler(device);\n"));
        assert!(!text.contains("STATUS_PROPERTY, property"));
        assert!(!text.contains("focuser_status_handler"));
    }

    #[test]
    fn test_attach_initialises_properties() {
        let text = device_code(
            "driver upb { serial { configurable_speed = true; } aux {
                interface = INDIGO_INTERFACE_AUX_POWERBOX;
                additional_instances = true;
                switch outlet { rule = INDIGO_ANY_OF_MANY_RULE; hidden = false; item one { value = true; } }
                number volts { group = \"Power\"; perm = INDIGO_RO_PERM; item v { max = 13.2; step = 0.1; format = \"%.1f\"; } }
                light warning { item dew; }
                text names { item a { label = \"A\"; value = \"Outlet A\"; } }
                inherited AUX_WEATHER { hidden = IS_HIDDEN(); on_attach { AUX_WEATHER_PROPERTY->count = 2; } }
            } }",
        );
        let lines = [
            "\tif (indigo_aux_attach(device, DRIVER_NAME, DRIVER_VERSION, INDIGO_INTERFACE_AUX_POWERBOX) == INDIGO_OK) {",
            "\t\tADDITIONAL_INSTANCES_PROPERTY->hidden = DEVICE_CONTEXT->base_device != NULL;",
            "\t\tDEVICE_BAUDRATE_PROPERTY->hidden = false;",
            "\t\tindigo_enumerate_serial_ports(device, DEVICE_PORTS_PROPERTY);",
            "\t\tOUTLET_PROPERTY = indigo_init_switch_property(NULL, device->name, OUTLET_PROPERTY_NAME, AUX_MAIN_GROUP, \"outlet\", INDIGO_OK_STATE, INDIGO_RW_PERM, INDIGO_ANY_OF_MANY_RULE, 1);",
            "\t\tindigo_init_switch_item(ONE_ITEM, ONE_ITEM_NAME, \"one\", true);",
            "\t\tOUTLET_PROPERTY->hidden = false;",
            "\t\tVOLTS_PROPERTY = indigo_init_number_property(NULL, device->name, VOLTS_PROPERTY_NAME, \"Power\", \"volts\", INDIGO_OK_STATE, INDIGO_RO_PERM, 1);",
            "\t\tindigo_init_number_item(V_ITEM, V_ITEM_NAME, \"v\", 0, 13.2, 0.1, 0);",
            "\t\tstrcpy(V_ITEM->number.format, \"%.1f\");",
            "\t\tWARNING_PROPERTY = indigo_init_light_property(NULL, device->name, WARNING_PROPERTY_NAME, AUX_MAIN_GROUP, \"warning\", INDIGO_OK_STATE, 1);",
            "\t\tindigo_init_light_item(DEW_ITEM, DEW_ITEM_NAME, \"dew\", INDIGO_IDLE_STATE);",
            "\t\tindigo_init_text_item(A_ITEM, A_ITEM_NAME, \"A\", \"Outlet A\");",
            "\t\tAUX_WEATHER_PROPERTY->hidden = IS_HIDDEN();",
            "\t\t//+ aux.AUX_WEATHER.on_attach\n\t\tAUX_WEATHER_PROPERTY->count = 2;\n\t\t//- aux.AUX_WEATHER.on_attach",
        ];
        for line in lines {
            assert!(text.contains(&format!("{}\n", line)), "missing: {}", line);
        }
        assert!(!text.contains("indigo_init_inherited"));
        assert!(!text.contains("indigo_release_property(AUX_WEATHER_PROPERTY)"));
        assert!(text.contains("\tindigo_release_property(NAMES_PROPERTY);\n"));
    }

    #[test]
    fn test_connection_handler_shapes() {
        let text = device_code(
            "driver duo {
                serial { }
                focuser {
                    on_timer { poll(device); }
                    on_connect { hello(device); }
                    on_disconnect { bye(device); }
                    number position { item value; }
                    text info { always_defined = true; item model; }
                }
                aux;
            }",
        );
        assert!(text.contains("\t\tif (PRIVATE_DATA->count++ == 0) {\n\t\t\tconnection_result = duo_open(device);\n\t\t}\n"));
        assert!(text.contains("\t\tif (--PRIVATE_DATA->count == 0) {\n\t\t\tduo_close(device);\n\t\t}\n"));
        assert!(text.contains(
            "\t\t\t//+ focuser.on_connect\n\t\t\thello(device);\n\t\t\t//- focuser.on_connect\n\t\t\tindigo_define_property(device, POSITION_PROPERTY, NULL);\n\t\t\tindigo_execute_handler(device, focuser_timer_callback);\n"
        ));
        assert!(!text.contains("indigo_define_property(device, INFO_PROPERTY, NULL);"));
        assert!(text.contains("\t\tindigo_delete_property(device, POSITION_PROPERTY, NULL);\n\t\t//+ focuser.on_disconnect\n"));
        assert!(text.contains("\tif (IS_CONNECTED) {\n\t\tINDIGO_DEFINE_MATCHING_PROPERTY(POSITION_PROPERTY);\n\t}\n\tINDIGO_DEFINE_MATCHING_PROPERTY(INFO_PROPERTY);\n"));
        assert!(text.contains("static void focuser_timer_callback(indigo_device *device) {\n\tif (!IS_CONNECTED) {\n\t\treturn;\n\t}\n"));
        assert!(!text.contains("aux_timer_callback"));
    }

    #[test]
    fn test_virtual_driver_skips_open() {
        let text = device_code("driver sim { wheel { number x { item y; } } }");
        assert!(!text.contains("sim_open"));
        assert!(!text.contains("sim_close"));
        assert!(text.contains("indigo_send_message(device, \"Connected to %s\", device->name);"));
        assert!(text.contains("\tif (indigo_wheel_attach(device, DRIVER_NAME, DRIVER_VERSION) == INDIGO_OK) {\n"));
    }

    #[test]
    fn test_change_handler_wraps_on_change() {
        let text = device_code(
            "driver foo { ccd { inherited CCD_COOLER { on_change { cool(device); } } } }",
        );
        assert!(text.contains(
            "// CCD_COOLER change handler\n\nstatic void ccd_cooler_handler(indigo_device *device) {\n\tpthread_mutex_lock(&PRIVATE_DATA->mutex);\n\tCCD_COOLER_PROPERTY->state = INDIGO_OK_STATE;\n\t//+ ccd.CCD_COOLER.on_change\n\tcool(device);\n\t//- ccd.CCD_COOLER.on_change\n\tindigo_update_property(device, CCD_COOLER_PROPERTY, NULL);\n\tpthread_mutex_unlock(&PRIVATE_DATA->mutex);\n}\n"
        ));
    }
}
