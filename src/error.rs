use thiserror::Error;

/// Ways a single log fetch can fail. All of them end up as `ViewState::Error`.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error! status: {status_code}")]
    Transport { status_code: u16 },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_mentions_status() {
        let err = FetchError::Transport { status_code: 503 };
        assert_eq!(err.to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn json_errors_convert_to_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FetchError = json_err.into();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().starts_with("malformed response body"));
    }
}
