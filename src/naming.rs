//! Output filenames for resized images.
//!
//! Every output is named after its upload: `photo.jpeg` becomes
//! `resized_photo.jpg` (the extension follows the *output* format, not the
//! original name). Inside one archive names must be unique, so repeats get a
//! numeric suffix:
//!
//! - `a.png`, `a.png`, `a.png` → `resized_a.png`, `resized_a_2.png`, `resized_a_3.png`
//! - `dir/a.png` → `resized_a.png` (directories are dropped)
//! - `""` → `resized_image.png`

use std::collections::HashSet;

/// Fallback stem when an upload has no usable filename.
const DEFAULT_STEM: &str = "image";

/// Build `resized_<stem>.<extension>` from an uploaded filename.
pub fn output_filename(original: &str, extension: &str) -> String {
    format!("resized_{}.{}", sanitized_stem(original), extension)
}

/// The filename stem with directories stripped and header-unsafe characters replaced.
fn sanitized_stem(original: &str) -> String {
    // Browsers may send either separator regardless of platform
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    };
    let cleaned: String = stem
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Make every name in `names` unique by suffixing repeats with `_2`, `_3`, ….
///
/// Order is preserved and the first occurrence keeps its name.
pub fn disambiguate(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let (stem, ext) = match name.rfind('.') {
                Some(dot) => (&name[..dot], &name[dot..]),
                None => (name.as_str(), ""),
            };
            let unique = (2..)
                .map(|n| format!("{stem}_{n}{ext}"))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| name.clone());
            taken.insert(unique.clone());
            unique
        })
        .collect()
}
