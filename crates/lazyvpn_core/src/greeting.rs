pub const DEFAULT_GREETING_NAME: &str = "World";

pub fn greeting_for(name: Option<&str>) -> String {
    let name = match name {
        Some(value) if !value.is_empty() => value,
        _ => DEFAULT_GREETING_NAME,
    };
    format!("Hello, {name}!")
}
