/// Commented starter config, as written by `logstore config init`
pub fn generate_starter_config() -> &'static str {
    include_str!("../../samples/sample-config.yml")
}
