use std::path::{Component, Path};

pub const MAX_NAME_LEN: usize = 255;

/// Checks that `name` can be used both as a lookup key and as a single file
/// name directly under the server root. Returns the reason on failure.
pub fn validate(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name is longer than 255 bytes");
    }
    if name.starts_with('.') {
        return Err("name must not start with a dot");
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err("name contains a path separator or control character");
    }

    // exactly one normal component, nothing the platform would reinterpret
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err("name is not a plain file name"),
    }
}
