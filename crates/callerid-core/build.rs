//! Build script for callerid-core
//!
//! Checks the minimum supported Rust version (1.70, for `Option::is_some_and`
//! and `once_cell`'s MSRV).

const MIN_RUST_VERSION: &str = "1.70.0";

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    let (Ok(found), Ok(required)) = (rustc_version::version(), rustc_version::Version::parse(MIN_RUST_VERSION)) else {
        // Some build environments hide rustc; don't fail the build over it.
        println!("cargo:warning=could not verify Rust version");
        return;
    };

    assert!(
        found >= required,
        "callerid-core requires Rust {required} or newer, found {found}"
    );
}
