//! `inspect` subcommand: print GGUF header metadata.

use std::error::Error;
use std::path::Path;

use crate::core::config::data::path_display;
use crate::core::gguf::{read_header_from_path, GgufHeader};
use crate::core::model_manager::format_size;

/// Keys shown when `--all` is not given.
const SUMMARY_KEYS: &[&str] = &[
    "general.architecture",
    "general.name",
    "general.file_type",
    "general.quantization_version",
];

pub fn inspect_model(path: &Path, all: bool) -> Result<(), Box<dyn Error>> {
    let header = read_header_from_path(path)?;
    let size = std::fs::metadata(path)?.len();
    print!("{}", render(path, size, &header, all));
    Ok(())
}

fn render(path: &Path, size: u64, header: &GgufHeader, all: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", path_display(path)));
    out.push_str(&format!("Size: {}\n", format_size(size)));
    out.push_str(&format!("GGUF version: {}\n", header.version));
    out.push_str(&format!("Tensors: {}\n", header.tensor_count));
    out.push_str(&format!("Metadata keys: {}\n", header.metadata.len()));
    if let Some(ctx) = header.context_length() {
        out.push_str(&format!("Context length: {ctx}\n"));
    }
    out.push('\n');

    for (key, value) in &header.metadata {
        if all || SUMMARY_KEYS.contains(&key.as_str()) {
            out.push_str(&format!("  {key} = {value}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gguf::read_header;
    use crate::core::gguf::test_support::minimal_model_bytes;

    #[test]
    fn summary_lists_core_fields() {
        let header = read_header(minimal_model_bytes().as_slice()).unwrap();
        let text = render(Path::new("/m/tiny.gguf"), 2048, &header, false);
        assert!(text.contains("Size: 2.00 KB"));
        assert!(text.contains("Tensors: 2"));
        assert!(text.contains("Context length: 4096"));
        assert!(text.contains("general.architecture = llama"));
        assert!(!text.contains("llama.context_length ="));

        let full = render(Path::new("/m/tiny.gguf"), 2048, &header, true);
        assert!(full.contains("llama.context_length = 4096"));
    }
}
