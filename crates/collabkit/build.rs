use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=README.md");

    let readme = fs::read_to_string("README.md").unwrap_or_default();
    let body = strip_frontmatter(&readme);

    let Ok(out_dir) = env::var("OUT_DIR") else {
        panic!("OUT_DIR is not set");
    };
    fs::write(Path::new(&out_dir).join("README.md"), body).expect("Failed to write README.md");
}

fn strip_frontmatter(content: &str) -> &str {
    if let Some(stripped) = content.strip_prefix("---")
        && let Some(end) = stripped.find("\n---")
    {
        return stripped[end + 4..].trim_start();
    }
    content
}
