//! JNI bindings for Android.
//!
//! These functions are called from Kotlin via the JNI bridge.

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;

use crate::{layout_json, layout_json_bytes};

/// Lay out a score document and return the layout summary as JSON.
///
/// Called from Kotlin as:
///   external fun layoutJson(json: String): String?
#[no_mangle]
pub extern "system" fn Java_com_scorelayout_app_ScoreLayout_layoutJson(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jstring {
    let json_str: String = match env.get_string(&json) {
        Ok(s) => s.into(),
        Err(_) => return std::ptr::null_mut(),
    };

    match layout_json(&json_str) {
        Ok(out) => match env.new_string(&out) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(e) => {
            log::warn!("layoutJson: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Lay out a UTF-8 encoded score document.
///
/// Called from Kotlin as:
///   external fun layoutBytes(data: ByteArray): String?
#[no_mangle]
pub extern "system" fn Java_com_scorelayout_app_ScoreLayout_layoutBytes(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
) -> jstring {
    let bytes = match env.convert_byte_array(&data) {
        Ok(b) => b,
        Err(_) => return std::ptr::null_mut(),
    };

    match layout_json_bytes(&bytes) {
        Ok(out) => match env.new_string(&out) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(e) => {
            log::warn!("layoutBytes: {e}");
            std::ptr::null_mut()
        }
    }
}
