// Embeds the pdfium shared library when the `bundled` feature is on.
//
// The file named by PDFIUM_BUNDLE_LIB is copied into OUT_DIR under a fixed
// name, and a generated `bundled.rs` exposes its bytes through
// `include_bytes!`. `src/lib.rs` pulls that file in with `include!`.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=PDFIUM_BUNDLE_LIB");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_BUNDLED");

    if std::env::var("CARGO_FEATURE_BUNDLED").is_err() {
        return;
    }

    let lib_src = match std::env::var("PDFIUM_BUNDLE_LIB") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => panic!(
            "\n\
             pdfium-auto: the `bundled` feature needs PDFIUM_BUNDLE_LIB set to the\n\
             platform pdfium library (libpdfium.so, libpdfium.dylib or pdfium.dll).\n\
             Prebuilt libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
        ),
    };

    if !lib_src.is_file() {
        panic!(
            "pdfium-auto: PDFIUM_BUNDLE_LIB does not name a file: {}",
            lib_src.display()
        );
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let lib_dest = out_dir.join("bundled_pdfium_lib");
    std::fs::copy(&lib_src, &lib_dest).unwrap_or_else(|e| {
        panic!(
            "pdfium-auto: copying {} to {} failed: {}",
            lib_src.display(),
            lib_dest.display(),
            e
        )
    });

    let bundled_rs = out_dir.join("bundled.rs");
    let code = "/// pdfium shared library embedded at compile time.\n\
                pub static PDFIUM_BYTES: &[u8] = include_bytes!(\"bundled_pdfium_lib\");\n";
    std::fs::write(&bundled_rs, code).unwrap_or_else(|e| {
        panic!("pdfium-auto: writing {} failed: {}", bundled_rs.display(), e)
    });

    println!("cargo:rerun-if-changed={}", lib_src.display());
}
