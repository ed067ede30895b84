//! FFI Module Tests

use super::*;
use crate::easy::CallbackKind;

#[test]
fn test_option_categories() {
    assert_eq!(EasyOpt::VERBOSE.category(), OptionCategory::Long);
    assert_eq!(EasyOpt::URL.category(), OptionCategory::ObjectPoint);
    assert_eq!(EasyOpt::HTTPHEADER.category(), OptionCategory::ObjectPoint);
    assert_eq!(EasyOpt::WRITEFUNCTION.category(), OptionCategory::FunctionPoint);
    assert_eq!(EasyOpt::XFERINFOFUNCTION.category(), OptionCategory::FunctionPoint);
    assert_eq!(EasyOpt::POSTFIELDSIZE_LARGE.category(), OptionCategory::OffT);
    assert_eq!(EasyOpt(40_291).category(), OptionCategory::Blob);
}

#[test]
fn test_wide_integer_allow_list() {
    assert!(EasyOpt::INFILESIZE_LARGE.is_wide_integer());
    assert!(EasyOpt::MAX_RECV_SPEED_LARGE.is_wide_integer());
    // Same category, not on the list
    assert!(!EasyOpt(30_999).is_wide_integer());
    assert!(!EasyOpt::POSTFIELDSIZE.is_wide_integer());
    assert!(!EasyOpt::TIMEOUT.is_wide_integer());
}

#[test]
fn test_option_display() {
    assert_eq!(EasyOpt::URL.to_string(), "CURLOPT_URL");
    assert_eq!(EasyOpt::XFERINFODATA.to_string(), "CURLOPT_XFERINFODATA");
    assert_eq!(EasyOpt(12_345).to_string(), "option 12345");
}

#[test]
fn test_info_types() {
    assert_eq!(Info::EFFECTIVE_URL.info_type(), InfoType::String);
    assert_eq!(Info::RESPONSE_CODE.info_type(), InfoType::Long);
    assert_eq!(Info::TOTAL_TIME.info_type(), InfoType::Double);
    assert_eq!(Info::COOKIELIST.info_type(), InfoType::Slist);
    assert_eq!(Info::SIZE_DOWNLOAD_T.info_type(), InfoType::OffT);
    assert_eq!(Info(0x70_0001).info_type(), InfoType::Unknown(0x70_0000));
    assert_eq!(Info::EFFECTIVE_URL.to_string(), "info 0x100001");
}

#[test]
fn test_sentinels() {
    assert_eq!(CURL_WRITEFUNC_PAUSE, 0x1000_0001);
    assert_eq!(CURL_READFUNC_ABORT, 0x1000_0000);
    assert_eq!(PROGRESS_CONTINUE, 0);
    assert_eq!(PROGRESS_ABORT, 1);
    assert_eq!(CURLPAUSE_ALL, 5);
}

#[test]
fn test_entry_point_table() {
    for (i, entry) in EntryPoint::ALL.iter().enumerate() {
        assert_eq!(entry.index(), i);
        assert!(entry.symbol().starts_with("curl_"));
    }
    assert_eq!(EntryPoint::EasyImpersonate.to_string(), "curl_easy_impersonate");
}

#[test]
fn test_trampoline_table_addresses() {
    let table = TrampolineTable::standard();
    let addrs: Vec<usize> = CallbackKind::ALL
        .iter()
        .map(|k| table.address(*k) as usize)
        .collect();
    assert!(addrs.iter().all(|a| *a != 0));
    // Write and header share a signature but not an adapter
    assert_ne!(addrs[0], addrs[2]);
    assert_eq!(
        table.address(CallbackKind::Read) as usize,
        crate::easy::trampoline::read_adapter as usize
    );
}

#[test]
fn test_unavailable_api_strerror_fallback() {
    let api = DynamicApi::unavailable("not installed");
    assert_eq!(api.load_error(), Some("not installed"));
    assert_eq!(api.missing_entry_points().len(), EntryPoint::COUNT);
    assert!(api.trampolines().address(CallbackKind::Write) as usize != 0);
}
