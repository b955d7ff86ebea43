use std::env;
use std::path::{Path, PathBuf};

/// Where the static libraries and headers come from.
struct NativeLayout {
    lib_dir: PathBuf,
    include_dirs: Vec<PathBuf>,
}

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-env-changed=LLAMA_PREBUILT_DIR");
    println!("cargo:rerun-if-env-changed=LLAMA_CPP_DIR");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    // Either link a llama.cpp install tree (`LLAMA_PREBUILT_DIR` with
    // `lib/` + `include/`) or build the source tree at `LLAMA_CPP_DIR`
    // (default: `vendor/llama.cpp` at the workspace root) with CMake.
    let layout = match env::var("LLAMA_PREBUILT_DIR") {
        Ok(prebuilt) => prebuilt_layout(Path::new(&prebuilt)),
        Err(_) => cmake_layout(&source_dir(), &target_os),
    };

    link(&layout.lib_dir, &target_os);
    generate_bindings(&layout.include_dirs);
}

fn source_dir() -> PathBuf {
    if let Ok(dir) = env::var("LLAMA_CPP_DIR") {
        return PathBuf::from(dir);
    }
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    manifest_dir.join("../../vendor/llama.cpp")
}

fn lib_subdir(root: &Path) -> PathBuf {
    if root.join("lib64").exists() {
        root.join("lib64")
    } else {
        root.join("lib")
    }
}

fn prebuilt_layout(root: &Path) -> NativeLayout {
    assert!(
        root.exists(),
        "LLAMA_PREBUILT_DIR={} does not exist",
        root.display()
    );
    println!(
        "cargo:warning=Linking prebuilt llama.cpp from {}",
        root.display()
    );
    NativeLayout {
        lib_dir: lib_subdir(root),
        include_dirs: vec![root.join("include")],
    }
}

fn cmake_layout(src: &Path, target_os: &str) -> NativeLayout {
    assert!(
        src.join("CMakeLists.txt").exists(),
        "llama.cpp source not found at {}. \
         Set LLAMA_CPP_DIR or LLAMA_PREBUILT_DIR.",
        src.display()
    );

    // Only the library itself is needed for tokenization.
    let mut cfg = cmake::Config::new(src);
    cfg.define("BUILD_SHARED_LIBS", "OFF")
        .define("LLAMA_BUILD_SERVER", "OFF")
        .define("LLAMA_BUILD_TESTS", "OFF")
        .define("LLAMA_BUILD_EXAMPLES", "OFF")
        .define("LLAMA_BUILD_TOOLS", "OFF")
        .define("LLAMA_BUILD_COMMON", "OFF")
        .define("LLAMA_CURL", "OFF");

    if env::var("CARGO_FEATURE_CUDA").is_ok() {
        cfg.define("GGML_CUDA", "ON");
    }
    if env::var("CARGO_FEATURE_VULKAN").is_ok() {
        cfg.define("GGML_VULKAN", "ON");
    }
    if target_os == "macos" {
        cfg.define("GGML_METAL", "ON");
    }

    let dst = cfg.build();
    NativeLayout {
        lib_dir: lib_subdir(&dst),
        include_dirs: vec![dst.join("include"), src.join("ggml/include")],
    }
}

fn link(lib_dir: &Path, target_os: &str) {
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=static=llama");

    // The ggml split differs between llama.cpp releases; link what exists.
    for name in ["ggml", "ggml-base", "ggml-cpu"] {
        if lib_dir.join(format!("lib{name}.a")).exists() {
            println!("cargo:rustc-link-lib=static={name}");
        }
    }

    if env::var("CARGO_FEATURE_CUDA").is_ok() && lib_dir.join("libggml-cuda.a").exists() {
        println!("cargo:rustc-link-lib=static=ggml-cuda");
        for lib in ["cuda", "cublas", "culibos", "cudart"] {
            println!("cargo:rustc-link-lib={lib}");
        }
    }
    if env::var("CARGO_FEATURE_VULKAN").is_ok() && lib_dir.join("libggml-vulkan.a").exists() {
        println!("cargo:rustc-link-lib=static=ggml-vulkan");
        println!("cargo:rustc-link-lib=vulkan");
    }

    match target_os {
        "linux" => {
            for lib in ["stdc++", "m", "pthread", "gomp"] {
                println!("cargo:rustc-link-lib={lib}");
            }
        }
        "macos" => {
            if lib_dir.join("libggml-metal.a").exists() {
                println!("cargo:rustc-link-lib=static=ggml-metal");
            }
            for fw in ["Accelerate", "Metal", "MetalKit", "Foundation"] {
                println!("cargo:rustc-link-lib=framework={fw}");
            }
            println!("cargo:rustc-link-lib=c++");
        }
        "windows" => println!("cargo:rustc-link-lib=msvcrt"),
        _ => {}
    }
}

fn generate_bindings(include_dirs: &[PathBuf]) {
    let mut builder = bindgen::Builder::default().header("wrapper.h");
    for dir in include_dirs.iter().filter(|d| d.exists()) {
        builder = builder.clang_arg(format!("-I{}", dir.display()));
    }

    let bindings = builder
        .allowlist_function("llama_.*")
        .allowlist_type("llama_.*")
        .allowlist_type("ggml_log_level")
        .allowlist_var("LLAMA_.*")
        .derive_default(true)
        .size_t_is_usize(true)
        .generate()
        .expect("Failed to generate llama.cpp bindings");

    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out.join("bindings.rs"))
        .expect("Failed to write bindings");
}
