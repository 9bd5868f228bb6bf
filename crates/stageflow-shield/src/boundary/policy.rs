//! Per-endpoint boundary configuration.

use axum::http::Method;

/// Whether an endpoint needs a caller session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Reject with 401 when no session can be established.
    #[default]
    Required,
    /// Resolve the session if present; anonymous callers pass.
    Optional,
    /// Never consult the session backend.
    Skip,
}

/// What the boundary enforces for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
    /// Name used in logs and flag lookups.
    pub name: String,
    pub methods: Vec<Method>,
    /// Check the double-submit token on state-changing methods.
    pub csrf: bool,
    pub session: SessionPolicy,
}

impl EndpointPolicy {
    /// `GET` only, CSRF on, session required.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: vec![Method::GET],
            csrf: true,
            session: SessionPolicy::Required,
        }
    }

    /// Anonymous read-only endpoint.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name).session(SessionPolicy::Skip)
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn csrf(mut self, enabled: bool) -> Self {
        self.csrf = enabled;
        self
    }

    pub fn session(mut self, policy: SessionPolicy) -> Self {
        self.session = policy;
        self
    }

    pub fn allows(&self, method: &Method) -> bool {
        *method == Method::OPTIONS || self.methods.contains(method)
    }

    /// Value of the `Allow` header.
    pub fn allow_header(&self) -> String {
        let mut names: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        if !self.methods.contains(&Method::OPTIONS) {
            names.push(Method::OPTIONS.as_str());
        }
        names.join(", ")
    }
}
