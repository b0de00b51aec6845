use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        panic!("OUT_DIR is not set");
    };

    // Crate docs are the READMEs minus their frontmatter
    let readmes = [
        ("README.md", "README.md"),
        ("src/crdt/README.md", "crdt_README.md"),
    ];

    for (src, dest) in readmes {
        println!("cargo:rerun-if-changed={}", src);
        let content = fs::read_to_string(src).unwrap_or_default();
        fs::write(Path::new(&out_dir).join(dest), strip_frontmatter(&content))
            .unwrap_or_else(|_| panic!("Failed to write {}", dest));
    }
}

/// Strip frontmatter (content between --- delimiters)
fn strip_frontmatter(content: &str) -> &str {
    if let Some(stripped) = content.strip_prefix("---")
        && let Some(end) = stripped.find("\n---")
    {
        return stripped[end + 4..].trim_start();
    }
    content
}
