//! Host page bridge for exported documents
//!
//! The export bootstrap registers these functions as a miniquad plugin.
//! Native builds have no host page: there is no embedded project and
//! messages only go to the log.

#[cfg(target_arch = "wasm32")]
extern "C" {
    fn playframe_project_len() -> usize;
    fn playframe_project_copy(dest: *mut u8, len: usize);
    fn playframe_message(text: *const u8, len: usize);
}

/// Project JSON embedded in the host page
#[cfg(target_arch = "wasm32")]
pub fn embedded_project() -> Option<String> {
    let len = unsafe { playframe_project_len() };
    if len == 0 {
        return None;
    }
    let mut buf = vec![0u8; len];
    unsafe { playframe_project_copy(buf.as_mut_ptr(), len) };
    String::from_utf8(buf).ok()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn embedded_project() -> Option<String> {
    None
}

/// Forward a runtime message to the host page console
#[cfg(target_arch = "wasm32")]
pub fn post_message(text: &str) {
    unsafe { playframe_message(text.as_ptr(), text.len()) }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn post_message(_text: &str) {}
