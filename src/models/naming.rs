//! Synthetic function names.
//!
//! Functions are named after their module and offset, e.g. `foo_20` for
//! offset 0x20 in `libfoo.so`, or `sub_1a40` inside the main binary.

use super::records::Module;
use crate::utils::config::{LIBRARY_PREFIX, MAIN_MODULE_PREFIX};

/// Name for the function at `offset` in `module`
pub fn function_name(module: &Module, offset: u64) -> String {
    format!("{}_{:x}", function_prefix(module), offset)
}

/// Name prefix shared by every function in `module`
///
/// Library modules lose a leading `lib`, every `-` and `_`, and their
/// last extension, then get lowercased.
pub fn function_prefix(module: &Module) -> String {
    if module.main {
        return MAIN_MODULE_PREFIX.to_string();
    }

    let name = module
        .name
        .strip_prefix(LIBRARY_PREFIX)
        .unwrap_or(&module.name);
    let name: String = name.chars().filter(|c| *c != '-' && *c != '_').collect();
    strip_extension(&name).to_lowercase()
}

/// Drop a trailing `.ext` where `ext` is a non-empty ASCII alphanumeric word
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => {
            let extension = &name[dot + 1..];
            if !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric()) {
                &name[..dot]
            } else {
                name
            }
        }
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, main: bool) -> Module {
        Module {
            id: 1,
            name: name.to_string(),
            path: format!("/usr/lib/{}", name),
            base: 0,
            main,
            calls: 0,
        }
    }

    #[test]
    fn test_library_name() {
        assert_eq!(function_name(&module("libfoo.so", false), 0x20), "foo_20");
    }

    #[test]
    fn test_main_module_uses_fixed_prefix() {
        assert_eq!(function_name(&module("app", true), 0x1a40), "sub_1a40");
    }

    #[test]
    fn test_separators_removed_and_case_folded() {
        assert_eq!(function_prefix(&module("libGLESv2-Core_x.dylib", false)), "glesv2corex");
        assert_eq!(function_prefix(&module("KERNEL32.DLL", false)), "kernel32");
    }

    #[test]
    fn test_only_last_extension_stripped() {
        assert_eq!(function_prefix(&module("libc.so.6", false)), "c.so");
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(function_prefix(&module("dyld", false)), "dyld");
        assert_eq!(function_prefix(&module("trailing.", false)), "trailing.");
    }

    #[test]
    fn test_lib_only_stripped_at_start() {
        assert_eq!(function_prefix(&module("zlib.so", false)), "zlib");
    }

    #[test]
    fn test_offset_rendered_lowercase_hex() {
        assert_eq!(function_name(&module("libfoo.so", false), 0xABCDEF), "foo_abcdef");
        assert_eq!(function_name(&module("libfoo.so", false), 0), "foo_0");
    }
}
