use thiserror::Error;

/// Boot option text kept for diagnostics (truncated to capacity)
pub type OptionText = heapless::String<32>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for boot option `{option}`")]
    InvalidValue {
        option: &'static str,
        value: OptionText,
    },

    #[error("malformed boot option `{token}`")]
    MalformedOption { token: OptionText },

    #[error("unterminated quote in boot option `{token}`")]
    UnterminatedQuote { token: OptionText },
}

impl ConfigError {
    pub fn invalid_value(option: &'static str, value: &str) -> Self {
        ConfigError::InvalidValue {
            option,
            value: truncated(value),
        }
    }

    pub fn malformed_option(token: &str) -> Self {
        ConfigError::MalformedOption {
            token: truncated(token),
        }
    }

    pub fn unterminated_quote(token: &str) -> Self {
        ConfigError::UnterminatedQuote {
            token: truncated(token),
        }
    }
}

fn truncated(text: &str) -> OptionText {
    let mut out = OptionText::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_values_are_truncated() {
        let long = "x".repeat(100);
        match ConfigError::invalid_value("time", &long) {
            ConfigError::InvalidValue { option, value } => {
                assert_eq!(option, "time");
                assert_eq!(value.len(), 32);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let err = ConfigError::invalid_value("hpet", "sometimes");
        assert_eq!(
            err.to_string(),
            "invalid value `sometimes` for boot option `hpet`"
        );
    }
}
