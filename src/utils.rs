use crate::config;
use crate::error::{AppError, AppResult};
use serde_json::Value;
use tokio::task;

pub async fn run_blocking<F, T>(func: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(func).await {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(AppError::from(e)),
    }
}

/// Wraps an identifier in literal quotes so spreadsheet tools keep it as text.
pub fn quote_id(id: &str) -> String {
    format!("\"{}\"", id)
}

/// `<m> min <s> sec` for whole-second values; anything else is `N/A`.
pub fn format_duration(raw: Option<&Value>) -> String {
    match raw.and_then(Value::as_i64) {
        Some(secs) => format!("{} min {} sec", secs / 60, secs % 60),
        None => config::NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn durations_render_minutes_and_seconds() {
        assert_eq!(format_duration(Some(&json!(0))), "0 min 0 sec");
        assert_eq!(format_duration(Some(&json!(3599))), "59 min 59 sec");
        assert_eq!(format_duration(Some(&json!(42.5))), "N/A");
        assert_eq!(format_duration(Some(&json!("60"))), "N/A");
        assert_eq!(format_duration(None), "N/A");
    }

    #[test]
    fn ids_are_quoted_verbatim() {
        assert_eq!(quote_id("7782342274025937895"), "\"7782342274025937895\"");
    }

    #[tokio::test]
    async fn blocking_errors_propagate() {
        let res: AppResult<()> =
            run_blocking(|| Err(AppError::Unexpected("nope".to_string()))).await;
        assert!(matches!(res, Err(AppError::Unexpected(_))));
    }
}
