// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Set panic hook for better error messages in the browser
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Debug line in the browser console; silent on native targets
#[cfg(target_arch = "wasm32")]
pub(crate) fn console_debug(message: &str) {
    web_sys::console::debug_1(&format!("[SCAN-LITE] {}", message).into());
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn console_debug(_message: &str) {}
