//! Transfer Info
//!
//! Typed `curl_easy_getinfo` results, decoded by the info code's category.

use std::os::raw::{c_char, c_long};
use std::ptr;

use tracing::warn;

use super::Easy;
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::c_string_lossy;
use crate::ffi::{CurlOffT, CurlSlist, Info, InfoType};

/// Pointer-typed infos that share the list category but are not string lists
const POINTER_INFOS: [u32; 3] = [0x40_0022, 0x40_002b, 0x40_002d];

/// Decoded info value
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    /// `None` when the engine returned a null string
    Text(Option<String>),
    Long(i64),
    Double(f64),
    OffT(i64),
    List(Vec<String>),
}

impl InfoValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InfoValue::Long(v) | InfoValue::OffT(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            InfoValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Copy every node of a native string list
///
/// # Safety
/// `head` must be null or a well formed list.
pub(crate) unsafe fn copy_list(head: *const CurlSlist) -> Vec<String> {
    let mut items = Vec::new();
    let mut node = head;
    while !node.is_null() {
        let data = (*node).data;
        if !data.is_null() {
            items.push(c_string_lossy(data));
        }
        node = (*node).next;
    }
    items
}

impl Easy {
    /// Query transfer information (`curl_easy_getinfo`)
    pub fn getinfo(&self, info: Info) -> BridgeResult<InfoValue> {
        let handle = self.handle()?;
        let api = &self.api;

        match info.info_type() {
            InfoType::String => {
                let mut out: *const c_char = ptr::null();
                self.check(unsafe { api.getinfo_string(handle, info, &mut out)? })?;
                let text = (!out.is_null()).then(|| unsafe { c_string_lossy(out) });
                Ok(InfoValue::Text(text))
            }
            InfoType::Long => {
                let mut out: c_long = 0;
                self.check(unsafe { api.getinfo_long(handle, info, &mut out)? })?;
                Ok(InfoValue::Long(i64::from(out)))
            }
            InfoType::Double => {
                let mut out: f64 = 0.0;
                self.check(unsafe { api.getinfo_double(handle, info, &mut out)? })?;
                Ok(InfoValue::Double(out))
            }
            InfoType::OffT => {
                let mut out: CurlOffT = 0;
                self.check(unsafe { api.getinfo_off_t(handle, info, &mut out)? })?;
                Ok(InfoValue::OffT(out))
            }
            InfoType::Slist if !POINTER_INFOS.contains(&info.0) => {
                let mut out: *mut CurlSlist = ptr::null_mut();
                self.check(unsafe { api.getinfo_slist(handle, info, &mut out)? })?;
                let items = unsafe { copy_list(out) };
                if !out.is_null() {
                    if let Err(e) = unsafe { api.slist_free_all(out) } {
                        warn!(info = %info, error = %e, "failed to free info list");
                    }
                }
                Ok(InfoValue::List(items))
            }
            _ => Err(BridgeError::UnsupportedInfo(info)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_copy_list_in_order() {
        let items: Vec<CString> = ["a", "b", "c"]
            .iter()
            .map(|s| CString::new(*s).unwrap())
            .collect();
        let mut third = CurlSlist {
            data: items[2].as_ptr() as *mut c_char,
            next: ptr::null_mut(),
        };
        let mut second = CurlSlist {
            data: items[1].as_ptr() as *mut c_char,
            next: &mut third,
        };
        let first = CurlSlist {
            data: items[0].as_ptr() as *mut c_char,
            next: &mut second,
        };

        assert_eq!(unsafe { copy_list(&first) }, vec!["a", "b", "c"]);
        assert!(unsafe { copy_list(ptr::null()) }.is_empty());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(InfoValue::Text(Some("x".into())).as_str(), Some("x"));
        assert_eq!(InfoValue::Text(None).as_str(), None);
        assert_eq!(InfoValue::Long(200).as_i64(), Some(200));
        assert_eq!(InfoValue::OffT(7).as_i64(), Some(7));
        assert_eq!(InfoValue::Double(0.5).as_f64(), Some(0.5));
        assert_eq!(InfoValue::List(vec!["a".into()]).as_list().map(|l| l.len()), Some(1));
        assert_eq!(InfoValue::Long(1).as_str(), None);
    }
}
