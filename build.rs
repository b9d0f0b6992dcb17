use std::env::var;

const LIB_DIR_ENV: &str = "SMARTFAN_LIB_DIR";

/// `libsmartfan` is built outside of this project, so when linking against it we
/// only need to know where it lives. It is otherwise assumed to be on the
/// default search path.
fn main() {
    println!("cargo:rerun-if-env-changed={LIB_DIR_ENV}");

    if var("CARGO_FEATURE_NATIVE").is_err() {
        return;
    }

    if let Ok(dir) = var(LIB_DIR_ENV) {
        println!("cargo:rustc-link-search=native={dir}");
    }
}
