use crate::config::AuthEndpoints;

/// Strip scheme/host, query and trailing slash so `/api/auth/login?x=1` and
/// `auth/login/` both compare as a path.
fn normalize(path: &str) -> &str {
    // query first: it may itself carry a URL
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = match path.find("://") {
        Some(idx) => {
            let rest = &path[idx + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => path,
    };
    path.trim_end_matches('/')
}

fn matches(path: &str, endpoint: &str) -> bool {
    let path = normalize(path);
    let endpoint = endpoint.trim_matches('/');
    if endpoint.is_empty() {
        return false;
    }
    let path = path.trim_start_matches('/');
    path == endpoint || path.ends_with(&format!("/{endpoint}"))
}

impl AuthEndpoints {
    fn all(&self) -> [&str; 5] {
        [
            self.login.as_str(),
            self.register.as_str(),
            self.refresh.as_str(),
            self.change_password.as_str(),
            self.logout.as_str(),
        ]
    }

    /// Whether `path` belongs to the authentication endpoint family.
    pub fn is_auth(&self, path: &str) -> bool {
        self.all().iter().any(|endpoint| matches(path, endpoint))
    }

    pub fn is_refresh(&self, path: &str) -> bool {
        matches(path, &self.refresh)
    }

    /// Auth endpoints whose failures never trigger a token refresh.
    pub fn is_refresh_exempt(&self, path: &str) -> bool {
        self.is_auth(path) && !self.is_refresh(path)
    }
}
