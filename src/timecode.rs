use crate::error::{AnimError, Result};

/// Parse a time given either as plain seconds ("12.5") or as "m:ss" ("1:05").
pub fn parse_time(param: &str, value: &str) -> Result<f64> {
    let value = value.trim();
    let secs = match value.split_once(':') {
        Some((mins, secs)) => {
            let mins: u64 = mins
                .parse()
                .map_err(|_| AnimError::config(param, format!("invalid minutes in '{}'", value)))?;
            let secs: f64 = secs
                .parse()
                .map_err(|_| AnimError::config(param, format!("invalid seconds in '{}'", value)))?;
            if !(0.0..60.0).contains(&secs) {
                return Err(AnimError::config(
                    param,
                    format!("seconds out of range in '{}'", value),
                ));
            }
            mins as f64 * 60.0 + secs
        }
        None => value
            .parse()
            .map_err(|_| AnimError::config(param, format!("'{}' is not a time", value)))?,
    };

    if !secs.is_finite() || secs < 0.0 {
        return Err(AnimError::config(param, format!("'{}' must be >= 0", value)));
    }
    Ok(secs)
}

/// Render seconds as "m:ss" for log output.
pub fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
