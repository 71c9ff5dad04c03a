fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let exporting = std::env::var_os("CARGO_FEATURE_EXPORT_SYMBOLS").is_some();

    // HEAP_SIZE is read with option_env! in src/config.rs.
    println!("cargo:rerun-if-env-changed=PBALLOC_HEAP_SIZE");

    match target_os.as_str() {
        "linux" if exporting => {
            let script = format!("{}/linker/version_script.lds", manifest_dir);
            println!(
                "cargo:rustc-cdylib-link-arg=-Wl,--version-script={}",
                script
            );
            println!("cargo:rerun-if-changed=linker/version_script.lds");
        }
        "macos" => {
            // All symbols are exported by default on macOS
        }
        _ => {}
    }
}
