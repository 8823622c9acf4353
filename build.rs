//! Build script for compile-time configuration injection.
//!
//! Set environment variables before building to configure the firmware:
//!
//!   DOOR_ALLOWED_UIDS="DE AD BE EF,CA FE BA BE" \
//!   DOOR_LOCK_HOLD_MS=10000 \
//!   DOOR_BACKLIGHT_HOLD_MS=10000 \
//!   DOOR_BUS_TIMEOUT_MS=50 \
//!   cargo build --release --features esp32

fn main() {
    // Re-run build script if these environment variables change
    println!("cargo::rerun-if-env-changed=DOOR_ALLOWED_UIDS");
    println!("cargo::rerun-if-env-changed=DOOR_LOCK_HOLD_MS");
    println!("cargo::rerun-if-env-changed=DOOR_BACKLIGHT_HOLD_MS");
    println!("cargo::rerun-if-env-changed=DOOR_BUS_TIMEOUT_MS");
}
