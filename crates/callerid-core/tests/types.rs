//! Tests for caller identification types

use std::collections::HashSet;

use callerid_core::types::{CallSiteKey, CallerInfo, ModuleIdentity, ResolvedFrame};

fn frame(function: &str, file: &str, line: u32) -> ResolvedFrame
{
    ResolvedFrame {
        key: CallSiteKey::new(0x1000),
        function: function.to_string(),
        file: file.to_string(),
        line,
    }
}

#[test]
fn test_call_site_key_from_usize()
{
    let key = CallSiteKey::from(0x1234_usize);
    assert_eq!(key.value(), 0x1234);
    assert_eq!(key, CallSiteKey::new(0x1234));
}

#[test]
fn test_call_site_key_display_is_hex()
{
    let key = CallSiteKey::new(0xbeef);
    assert_eq!(key.to_string(), "0x000000000000beef");
}

#[test]
fn test_call_site_key_hashes_by_address()
{
    let keys: HashSet<_> = [0x10, 0x20, 0x10].into_iter().map(CallSiteKey::new).collect();
    assert_eq!(keys.len(), 2);
}

#[test]
fn test_module_identity_display()
{
    assert_eq!(ModuleIdentity::new("serde", "1.0.200").to_string(), "serde@1.0.200");
    assert_eq!(ModuleIdentity::new("my_app::handlers", "").to_string(), "my_app::handlers");
    assert_eq!(ModuleIdentity::unknown().to_string(), "<unknown>");
}

#[test]
fn test_module_identity_owns_on_path_boundary()
{
    let serde = ModuleIdentity::new("serde", "1.0.200");
    assert!(serde.owns("serde"));
    assert!(serde.owns("serde::de::Deserialize"));
    assert!(!serde.owns("serde_json::de"));
    assert!(!serde.owns("ser"));
    assert!(!ModuleIdentity::unknown().owns("serde"));
}

#[test]
fn test_caller_info_accessors()
{
    let info = CallerInfo::new(
        frame("my_app::handlers::login", "src/handlers.rs", 42),
        ModuleIdentity::new("my_app", "0.3.1"),
    );

    assert_eq!(info.function(), "my_app::handlers::login");
    assert_eq!(info.file(), "src/handlers.rs");
    assert_eq!(info.line(), 42);
    assert_eq!(info.module(), "my_app");
    assert_eq!(info.module_version(), "0.3.1");
}

#[test]
fn test_caller_info_display()
{
    let info = CallerInfo::new(
        frame("my_app::handlers::login", "src/handlers.rs", 42),
        ModuleIdentity::new("my_app", "0.3.1"),
    );
    assert_eq!(info.to_string(), "my_app::handlers::login (src/handlers.rs:42) [my_app@0.3.1]");

    let heuristic = CallerInfo::new(frame("my_app::run", "", 0), ModuleIdentity::new("my_app", ""));
    assert_eq!(heuristic.to_string(), "my_app::run [my_app]");

    let unknown = CallerInfo::new(frame("", "", 0), ModuleIdentity::unknown());
    assert_eq!(unknown.to_string(), "<unknown>");
}

#[test]
fn test_caller_info_serializes_flat()
{
    let info = CallerInfo::new(
        frame("hyper::proto::h1::dispatch", "src/proto/h1/dispatch.rs", 120),
        ModuleIdentity::new("hyper", "1.4.1"),
    );

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["module"], "hyper");
    assert_eq!(json["module_version"], "1.4.1");
    assert_eq!(json["line"], 120);
}
