pub const SMOKE_DISPLAY_VERSION: &str = env!("SMOKE_DISPLAY_VERSION");
pub const SMOKE_BUILD_N: &str = env!("SMOKE_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "Smoke explorer {}\nBuild {}\nFire-smoke exposure scenarios for Equatorial Asia",
        SMOKE_DISPLAY_VERSION, SMOKE_BUILD_N
    )
}

pub fn short_version_text() -> String {
    format!("Smoke explorer {SMOKE_DISPLAY_VERSION}")
}
