use serde::Deserialize;
use std::collections::HashMap;

use crate::config::RateLimit;

// Composite key - one quota and one counter per (API key, endpoint path)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub api_key: String,
    pub path: String,
}

impl Identity {
    pub fn new(api_key: String, path: String) -> Self {
        Self { api_key, path }
    }
}

// Static per-endpoint limits, never mutated after load
#[derive(Clone, Copy, Debug)]
pub struct Quota {
    pub rpm: u32,
    pub tpm: u32,
}

// Post-admission processing discipline, resolved once per API key at
// catalog build time instead of re-matching the key string on every call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Immediate,
    Delayed,
    Background,
    #[default]
    Default,
}

// Everything the engine needs per identity besides the counter itself
pub struct LimitEntry {
    pub quota: Quota,
    pub class: PriorityClass,
}

// Immutable Identity -> limits mapping, built once at startup
pub struct LimitCatalog {
    entries: HashMap<Identity, LimitEntry>,
}

impl LimitCatalog {
    // One entry per configured (API key, endpoint path); if the same pair
    // appears twice, the later entry wins
    pub fn build(rate_limits: &[RateLimit]) -> Self {
        let mut entries = HashMap::new();

        for rate_limit in rate_limits {
            for endpoint in &rate_limit.endpoints {
                let identity = Identity::new(rate_limit.api_key.clone(), endpoint.path.clone());
                entries.insert(
                    identity,
                    LimitEntry {
                        quota: Quota {
                            rpm: endpoint.rpm,
                            tpm: endpoint.tpm,
                        },
                        class: rate_limit.priority,
                    },
                );
            }
        }

        Self { entries }
    }

    pub fn get(&self, identity: &Identity) -> Option<&LimitEntry> {
        self.entries.get(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn limit(api_key: &str, priority: PriorityClass, endpoints: &[(&str, u32, u32)]) -> RateLimit {
        RateLimit {
            api_key: api_key.to_string(),
            priority,
            endpoints: endpoints
                .iter()
                .map(|(path, rpm, tpm)| EndpointConfig {
                    path: path.to_string(),
                    rpm: *rpm,
                    tpm: *tpm,
                })
                .collect(),
        }
    }

    #[test]
    fn builds_one_entry_per_endpoint() {
        let catalog = LimitCatalog::build(&[
            limit("KEY_A", PriorityClass::Immediate, &[("/api/a", 10, 100), ("/api/b", 5, 50)]),
            limit("KEY_B", PriorityClass::Default, &[("/api/a", 1, 1)]),
        ]);

        assert_eq!(catalog.len(), 3);

        let entry = catalog
            .get(&Identity::new("KEY_A".into(), "/api/b".into()))
            .unwrap();
        assert_eq!(entry.quota.rpm, 5);
        assert_eq!(entry.quota.tpm, 50);
        assert_eq!(entry.class, PriorityClass::Immediate);
    }

    #[test]
    fn duplicate_identity_last_write_wins() {
        let catalog = LimitCatalog::build(&[
            limit("KEY_A", PriorityClass::Default, &[("/api/a", 10, 100)]),
            limit("KEY_A", PriorityClass::Delayed, &[("/api/a", 99, 999)]),
        ]);

        assert_eq!(catalog.len(), 1);

        let entry = catalog
            .get(&Identity::new("KEY_A".into(), "/api/a".into()))
            .unwrap();
        assert_eq!(entry.quota.rpm, 99);
        assert_eq!(entry.quota.tpm, 999);
        assert_eq!(entry.class, PriorityClass::Delayed);
    }

    #[test]
    fn unknown_identity_is_absent() {
        let catalog = LimitCatalog::build(&[limit(
            "KEY_A",
            PriorityClass::Default,
            &[("/api/a", 10, 100)],
        )]);

        assert!(catalog
            .get(&Identity::new("KEY_A".into(), "/api/missing".into()))
            .is_none());
        assert!(catalog
            .get(&Identity::new("OTHER".into(), "/api/a".into()))
            .is_none());
    }
}
