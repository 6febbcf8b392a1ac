//! Compiled service matchers.

use regex::Regex;
use sso_sdk::{RegisteredService, Service, ServiceMatcher, ServiceRegistryError};

#[derive(Debug, Clone)]
enum CompiledMatcher {
    Exact(String),
    Regex(Regex),
    Prefix(String),
}

/// A registered service with its matcher compiled once.
#[derive(Debug, Clone)]
pub struct MatchableService {
    definition: RegisteredService,
    matcher: CompiledMatcher,
}

impl MatchableService {
    /// # Errors
    /// [`ServiceRegistryError::InvalidDefinition`] for an invalid regex.
    pub fn compile(definition: RegisteredService) -> Result<Self, ServiceRegistryError> {
        let matcher = match &definition.matcher {
            ServiceMatcher::Exact { url } => CompiledMatcher::Exact(url.clone()),
            ServiceMatcher::Prefix { prefix } => CompiledMatcher::Prefix(prefix.clone()),
            ServiceMatcher::Regex { pattern } => CompiledMatcher::Regex(Regex::new(pattern).map_err(
                |e| ServiceRegistryError::InvalidDefinition {
                    id: definition.id,
                    reason: e.to_string(),
                },
            )?),
        };
        Ok(Self {
            definition,
            matcher,
        })
    }

    #[must_use]
    pub fn matches(&self, service: &Service) -> bool {
        let id = service.id();
        match &self.matcher {
            CompiledMatcher::Exact(url) => url == id,
            CompiledMatcher::Prefix(prefix) => id.starts_with(prefix.as_str()),
            CompiledMatcher::Regex(re) => re.is_match(id),
        }
    }

    #[must_use]
    pub fn definition(&self) -> &RegisteredService {
        &self.definition
    }
}

/// Compile and order definitions by evaluation order, then id.
///
/// # Errors
/// The first invalid definition.
pub fn compile_all(
    definitions: Vec<RegisteredService>,
) -> Result<Vec<MatchableService>, ServiceRegistryError> {
    let mut compiled = definitions
        .into_iter()
        .map(MatchableService::compile)
        .collect::<Result<Vec<_>, _>>()?;
    compiled.sort_by_key(|s| (s.definition.evaluation_order, s.definition.id));
    Ok(compiled)
}

/// First match in evaluation order.
#[must_use]
pub fn find_match<'a>(
    services: &'a [MatchableService],
    service: &Service,
) -> Option<&'a RegisteredService> {
    services
        .iter()
        .find(|s| s.matches(service))
        .map(MatchableService::definition)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn def(id: u64, order: i32, matcher: ServiceMatcher) -> RegisteredService {
        RegisteredService {
            evaluation_order: order,
            matcher,
            ..RegisteredService::exact(id, "unused")
        }
    }

    #[test]
    fn evaluation_order_decides_between_overlapping_matchers() {
        let services = compile_all(vec![
            def(
                1,
                100,
                ServiceMatcher::Regex {
                    pattern: "^https://.*".to_owned(),
                },
            ),
            def(
                2,
                1,
                ServiceMatcher::Prefix {
                    prefix: "https://app.example.org/".to_owned(),
                },
            ),
        ])
        .unwrap();

        let app = Service::new("https://app.example.org/login");
        let other = Service::new("https://other.example.org");
        assert_eq!(find_match(&services, &app).map(|s| s.id), Some(2));
        assert_eq!(find_match(&services, &other).map(|s| s.id), Some(1));
        assert!(find_match(&services, &Service::new("http://plain")).is_none());
    }

    #[test]
    fn exact_matcher_is_exact() {
        let services = compile_all(vec![RegisteredService::exact(1, "https://a")]).unwrap();
        assert!(find_match(&services, &Service::new("https://a")).is_some());
        assert!(find_match(&services, &Service::new("https://a/")).is_none());
    }

    #[test]
    fn invalid_regex_is_reported_with_service_id() {
        let err = compile_all(vec![def(
            9,
            0,
            ServiceMatcher::Regex {
                pattern: "(".to_owned(),
            },
        )])
        .unwrap_err();
        assert!(matches!(err, ServiceRegistryError::InvalidDefinition { id: 9, .. }));
    }
}
