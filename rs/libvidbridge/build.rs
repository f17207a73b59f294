use std::env;
use std::fs;
use std::path::PathBuf;

// Engines embedding the bridge include this as <vidbridge.h>.
const HEADER: &str = "vidbridge.h";

fn main() {
	let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
	println!("cargo:rerun-if-changed=src");

	let include_dir = include_dir();
	fs::create_dir_all(&include_dir).expect("Failed to create include directory");

	// The engine function table and event structs are written by C and C++ hosts alike.
	cbindgen::Builder::new()
		.with_crate(&crate_dir)
		.with_language(cbindgen::Language::C)
		.with_cpp_compat(true)
		.with_include_guard("VIDBRIDGE_H")
		.with_header("/* Generated from libvidbridge, do not edit. */")
		.with_documentation(true)
		.with_sys_include("stdbool.h")
		.generate()
		.expect("Unable to generate bindings")
		.write_to_file(include_dir.join(HEADER));
}

// OUT_DIR is target/{profile}/build/{crate}-{hash}/out; the header goes in target/include.
fn include_dir() -> PathBuf {
	let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
	let target = out_dir.ancestors().nth(4).expect("Failed to get target directory from OUT_DIR");
	target.join("include")
}
