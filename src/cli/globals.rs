use secrecy::SecretString;

/// Settings shared across actions: the token-signing secret and the
/// issuer/audience baked into every bearer token.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub token_issuer: String,
    pub token_audience: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(token_secret: SecretString, token_issuer: String, token_audience: String) -> Self {
        Self {
            token_secret,
            token_issuer,
            token_audience,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("shh".to_string()),
            "fakturi".to_string(),
            "fakturi-api".to_string(),
        );
        assert_eq!(args.token_secret.expose_secret(), "shh");
        assert_eq!(args.token_issuer, "fakturi");
        assert_eq!(args.token_audience, "fakturi-api");
    }
}
