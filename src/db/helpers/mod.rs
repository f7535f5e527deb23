use anyhow::{anyhow, Result};
use reqwest::StatusCode;

pub fn parse_status(value: i64) -> Result<StatusCode> {
    u16::try_from(value)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| anyhow!("invalid stored status code {value}"))
}
