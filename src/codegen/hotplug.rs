//! Entry point of drivers registering a libusb hot-plug callback. Every
//! plugged device gets its own slot of private data and device instances.

use super::source::{driver_info, entry_point_header, inline_driver_block, match_patterns};
use super::writer::SourceWriter;
use crate::dsl::{Driver, DriverRole};

const MAX_DEVICES: usize = 8;

pub fn generate(w: &mut SourceWriter, driver: &Driver) {
    w.section("Hot-plug code");
    w.line(format!("#define MAX_DEVICES {}", MAX_DEVICES));
    w.blank();
    w.line("static pthread_mutex_t hotplug_mutex = PTHREAD_MUTEX_INITIALIZER;");
    w.line(format!(
        "static {} *private_data[MAX_DEVICES] = {{ NULL }};",
        driver.private_data_type()
    ));
    for device in &driver.devices {
        w.line(format!(
            "static indigo_device *{}[MAX_DEVICES] = {{ NULL }};",
            device.kind
        ));
    }
    w.blank();
    plug_event(w, driver);
    unplug_event(w, driver);
    callback(w);
    main_code(w, driver);
}

fn plug_event(w: &mut SourceWriter, driver: &Driver) {
    let data_type = driver.private_data_type();
    w.open("static void process_plug_event(libusb_device *dev) {");
    w.line("int slot = -1;");
    w.open("for (int i = 0; i < MAX_DEVICES; i++) {");
    w.open("if (private_data[i] == NULL) {");
    w.line("slot = i;");
    w.line("break;");
    w.close("}");
    w.close("}");
    w.open("if (slot < 0) {");
    w.line("INDIGO_DRIVER_ERROR(DRIVER_NAME, \"No device slots available\");");
    w.line("return;");
    w.close("}");
    w.line(format!("{0} *data = indigo_safe_malloc(sizeof({0}));", data_type));
    w.line("pthread_mutex_init(&data->mutex, NULL);");
    w.line("data->dev = libusb_ref_device(dev);");
    w.line("private_data[slot] = data;");
    let first = driver.devices.first().map(|device| device.kind);
    for device in &driver.devices {
        let var = device.kind.keyword();
        w.line(format!(
            "indigo_device *{0}_device = indigo_safe_malloc_copy(sizeof(indigo_device), &{0}_template);",
            var
        ));
        w.line(format!("{}_device->private_data = data;", var));
        if let Some(first) = first.filter(|first| *first != device.kind) {
            w.line(format!("{}_device->master_device = {}[slot];", var, first));
        }
        w.line(format!("{0}[slot] = {0}_device;", var));
        w.line(format!("indigo_attach_device({}_device);", var));
    }
    w.close("}");
    w.blank();
}

fn unplug_event(w: &mut SourceWriter, driver: &Driver) {
    w.open("static void process_unplug_event(libusb_device *dev) {");
    w.open("for (int i = 0; i < MAX_DEVICES; i++) {");
    w.line(format!("{} *data = private_data[i];", driver.private_data_type()));
    w.open("if (data == NULL || (dev != NULL && data->dev != dev)) {");
    w.line("continue;");
    w.close("}");
    for device in driver.devices.iter().rev() {
        let var = device.kind.keyword();
        w.open(format!("if ({}[i] != NULL) {{", var));
        w.line(format!("indigo_detach_device({}[i]);", var));
        w.line(format!("free({}[i]);", var));
        w.line(format!("{}[i] = NULL;", var));
        w.close("}");
    }
    w.line("libusb_unref_device(data->dev);");
    w.line("pthread_mutex_destroy(&data->mutex);");
    w.line("free(data);");
    w.line("private_data[i] = NULL;");
    w.close("}");
    w.close("}");
    w.blank();
}

fn callback(w: &mut SourceWriter) {
    w.open("static int hotplug_callback(libusb_context *ctx, libusb_device *dev, libusb_hotplug_event event, void *user_data) {");
    w.line("pthread_mutex_lock(&hotplug_mutex);");
    w.open("switch (event) {");
    w.open("case LIBUSB_HOTPLUG_EVENT_DEVICE_ARRIVED:");
    w.line("process_plug_event(dev);");
    w.line("break;");
    w.outdent();
    w.open("case LIBUSB_HOTPLUG_EVENT_DEVICE_LEFT:");
    w.line("process_unplug_event(dev);");
    w.line("break;");
    w.outdent();
    w.close("}");
    w.line("pthread_mutex_unlock(&hotplug_mutex);");
    w.line("return 0;");
    w.close("}");
    w.blank();
    w.line("static libusb_hotplug_callback_handle callback_handle;");
    w.blank();
}

fn main_code(w: &mut SourceWriter, driver: &Driver) {
    let any = "LIBUSB_HOTPLUG_MATCH_ANY";
    let usb = driver.usb.as_ref();
    let vendor_id = usb.and_then(|usb| usb.vendor_id.as_deref()).unwrap_or(any);
    let product_id = usb.and_then(|usb| usb.product_id.as_deref()).unwrap_or(any);

    w.section("Main code");
    entry_point_header(w, driver);
    driver_info(w, true);

    w.open("switch (action) {");
    w.open("case INDIGO_DRIVER_INIT: {");
    w.line("last_action = action;");
    inline_driver_block(w, driver, DriverRole::OnInit);
    match_patterns(w, driver);
    w.line("indigo_start_usb_event_handler();");
    w.line(format!(
        "int rc = libusb_hotplug_register_callback(NULL, LIBUSB_HOTPLUG_EVENT_DEVICE_ARRIVED | LIBUSB_HOTPLUG_EVENT_DEVICE_LEFT, LIBUSB_HOTPLUG_ENUMERATE, {}, {}, {}, hotplug_callback, NULL, &callback_handle);",
        vendor_id, product_id, any
    ));
    w.line("INDIGO_DRIVER_DEBUG(DRIVER_NAME, \"libusb_hotplug_register_callback ->  %s\", rc < 0 ? libusb_error_name(rc) : \"OK\");");
    w.line("return rc >= 0 ? INDIGO_OK : INDIGO_FAILED;");
    w.close("}");
    w.blank();

    w.open("case INDIGO_DRIVER_SHUTDOWN:");
    w.open("for (int i = 0; i < MAX_DEVICES; i++) {");
    for device in &driver.devices {
        w.line(format!("VERIFY_NOT_CONNECTED({}[i]);", device.kind));
    }
    w.close("}");
    w.line("last_action = action;");
    w.line("libusb_hotplug_deregister_callback(NULL, callback_handle);");
    w.line("INDIGO_DRIVER_DEBUG(DRIVER_NAME, \"libusb_hotplug_deregister_callback\");");
    w.line("pthread_mutex_lock(&hotplug_mutex);");
    w.line("process_unplug_event(NULL);");
    w.line("pthread_mutex_unlock(&hotplug_mutex);");
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
