use std::env;
use std::fs;
use std::path::PathBuf;

/// Writes `oyster.h` into `OUT_DIR`, or into `OYSTER_HEADER_DIR` when set so a
/// host project can pick it up from a fixed place.
fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-env-changed=OYSTER_HEADER_DIR");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let Some(header_dir) = env::var_os("OYSTER_HEADER_DIR").or_else(|| env::var_os("OUT_DIR"))
    else {
        println!("cargo:warning=skipping oyster.h: neither OYSTER_HEADER_DIR nor OUT_DIR is set");
        return;
    };
    let header_dir = PathBuf::from(header_dir);
    let out = header_dir.join("oyster.h");

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("OYSTER_FFI_H".to_string()),
        cpp_compat: true,
        ..Default::default()
    };

    // A header that fails to generate must not break the library build.
    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => bindings,
        Err(e) => {
            println!("cargo:warning=skipping oyster.h: {e}");
            return;
        }
    };
    if let Err(e) = fs::create_dir_all(&header_dir) {
        println!("cargo:warning=cannot create {}: {e}", header_dir.display());
        return;
    }
    bindings.write_to_file(&out);
    if !out.exists() {
        println!("cargo:warning=failed to write {}", out.display());
    }
}
