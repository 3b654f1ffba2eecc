pub trait SessionProvider: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

// Serves the credential loaded at startup; empty means no session.
pub struct StaticSessionProvider {
    token: Option<String>,
}

impl StaticSessionProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl SessionProvider for StaticSessionProvider {
    fn current_token(&self) -> Option<String> {
        self.token.clone()
    }
}
