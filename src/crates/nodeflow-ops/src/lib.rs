//! # nodeflow-ops
//!
//! Builtin operation packs for nodeflow, registered by `module::name`
//! reference:
//!
//! | Namespace | Kind | Operations |
//! |---|---|---|
//! | `math::` | plain | add, subtract, multiply, divide, power, round |
//! | `text::` | plain | concat, uppercase, lowercase, word_count, split_name, join |
//! | `progress::` | progress | ticker, batch_sum |
//! | `stream::` | stream | spell, chunked_echo |
//!
//! The crate only provides callables; the schemas clients see come from the
//! nodepack manifests the server scans (the repo ships a matching tree
//! under `nodepacks/builtin/`). Keeping the two separate lets a deployment
//! expose a subset of the library, rename entries, or tighten parameter
//! types without touching Rust.

use nodeflow_core::OpLibrary;

pub mod math;
pub mod progress;
pub mod stream;
pub mod text;

/// Library with every builtin pack registered
pub fn builtin_library() -> OpLibrary {
    let mut library = OpLibrary::new();
    math::register(&mut library);
    text::register(&mut library);
    progress::register(&mut library);
    stream::register(&mut library);
    library
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_covers_all_namespaces() {
        let library = builtin_library();
        assert!(library.get_plain("math::add").is_some());
        assert!(library.get_plain("text::split_name").is_some());
        assert!(library.get_progress("progress::ticker").is_some());
        assert!(library.get_stream("stream::spell").is_some());
        assert!(library.get_plain("progress::ticker").is_none());
    }
}
