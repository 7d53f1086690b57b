/// Request names for one vehicle, all under a common namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    ns: String,
    pub arming: String,
    pub takeoff: String,
    pub land: String,
    pub set_mode: String,
    pub rc_override: String,
}

impl Endpoints {
    /// `ns` is normalized to one leading slash and no trailing slash; an
    /// empty or all-slash namespace puts everything at the root.
    pub fn new(ns: &str) -> Self {
        let trimmed = ns.trim().trim_matches('/');
        let ns = if trimmed.is_empty() { String::new() } else { format!("/{}", trimmed) };
        Self {
            arming: format!("{}/cmd/arming", ns),
            takeoff: format!("{}/cmd/takeoff", ns),
            land: format!("{}/cmd/land", ns),
            set_mode: format!("{}/set_mode", ns),
            rc_override: format!("{}/rc/override", ns),
            ns,
        }
    }

    pub fn namespace(&self) -> &str {
        if self.ns.is_empty() { "/" } else { &self.ns }
    }
}
