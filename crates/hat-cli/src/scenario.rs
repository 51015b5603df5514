//! Scenario ("hatfile") loading and validation.

use anyhow::Context;
use hat_engine::{Route, RunConfig, RunOptions};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;

pub const DEFAULT_FILE: &str = "hatfile.yaml";

/// Everything a run needs, read once from a YAML or JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub options: RunOptions,

    /// Hide the builtin `test-routes` test from `runall` and `list`.
    #[serde(default)]
    pub ignore_builtin: bool,

    #[serde(default)]
    pub routes: Vec<Route>,

    /// Named route groups, in declaration order.
    #[serde(default, deserialize_with = "ordered_suites")]
    pub suites: Vec<Suite>,
}

/// A named group of routes run as one test.
#[derive(Debug, Clone, PartialEq)]
pub struct Suite {
    pub name: String,
    pub doc: Option<String>,
    /// Overrides the file's hosts when set.
    pub hosts: Option<Vec<String>>,
    pub routes: Vec<Route>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteDef {
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    hosts: Option<Vec<String>>,
    #[serde(default)]
    routes: Vec<Route>,
}

impl ScenarioFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file '{}'", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid scenario file '{}'", path.display()))
    }

    /// Parse YAML (and therefore JSON) scenario text.
    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let scenario: ScenarioFile = serde_yaml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Validate the scenario.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_hosts("hosts", &self.hosts)?;

        let mut seen: Vec<String> = vec![crate::runner::normalize_name(crate::runner::BUILTIN_TEST)];
        for suite in &self.suites {
            if suite.name.trim().is_empty() {
                anyhow::bail!("Suite names must not be empty");
            }
            let normalized = crate::runner::normalize_name(&suite.name);
            if seen.contains(&normalized) {
                anyhow::bail!(
                    "Duplicate test name: '{}'. Names differing only in '-' and '_' are the same test",
                    suite.name
                );
            }
            seen.push(normalized);

            if let Some(hosts) = &suite.hosts {
                validate_hosts(&format!("suites.{}.hosts", suite.name), hosts)?;
            }
        }

        Ok(())
    }

    /// Run configuration for the top-level routes.
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.hosts.iter().cloned(), self.routes.iter().cloned())
            .with_options(self.options)
    }
}

impl Suite {
    /// Run configuration for this suite, falling back to the file's hosts.
    pub fn run_config(&self, scenario: &ScenarioFile) -> RunConfig {
        let hosts = self.hosts.as_ref().unwrap_or(&scenario.hosts);
        RunConfig::new(hosts.iter().cloned(), self.routes.iter().cloned())
            .with_options(scenario.options)
    }
}

fn validate_hosts(field: &str, hosts: &[String]) -> Result<(), anyhow::Error> {
    for host in hosts {
        if host.trim().is_empty() {
            anyhow::bail!("Empty host in '{field}'");
        }
        if !host.contains("://") {
            anyhow::bail!("Host '{host}' in '{field}' must include a scheme, e.g. 'http://{host}'");
        }
    }
    Ok(())
}

/// Deserialize the `suites` mapping while keeping its order.
fn ordered_suites<'de, D>(deserializer: D) -> Result<Vec<Suite>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SuitesVisitor;

    impl<'de> Visitor<'de> for SuitesVisitor {
        type Value = Vec<Suite>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of suite names to suites")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut suites = Vec::new();
            while let Some((name, def)) = map.next_entry::<String, SuiteDef>()? {
                suites.push(Suite {
                    name,
                    doc: def.doc,
                    hosts: def.hosts,
                    routes: def.routes,
                });
            }
            Ok(suites)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(SuitesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hat_engine::Method;
    use std::io::Write;

    const HATFILE: &str = r#"
hosts: ["http://localhost:8080/"]
options: { session: false }
routes:
  - path: /test
    method: GET
    response: 200
    store: [{ path: response.body-object.id, key: testId }]
    doc: Test get request with id extractor
  - path: /test
    method: POST
    headers: { X-Trace: "{testId}" }
    body: { id: { $int: "123{testId}" }, username: test2 }
    response: { code: 201, body: { id: { $int: "123{testId}" }, username: test2 } }
suites:
  zeta:
    doc: Declared first
    routes: [ { path: /z } ]
  alpha:
    hosts: ["http://other:9000"]
    routes: [ { path: /a, method: DELETE } ]
"#;

    #[test]
    fn test_parse_full_file() {
        let scenario = ScenarioFile::from_yaml(HATFILE).unwrap();
        assert_eq!(scenario.hosts, vec!["http://localhost:8080/"]);
        assert!(!scenario.options.session);
        assert!(!scenario.ignore_builtin);
        assert_eq!(scenario.routes.len(), 2);
        assert_eq!(scenario.routes[1].method(), &Method::Post);
        assert_eq!(scenario.routes[1].response().code, 201);

        let names: Vec<&str> = scenario.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(scenario.suites[0].doc.as_deref(), Some("Declared first"));
    }

    #[test]
    fn test_suite_hosts_fallback() {
        let scenario = ScenarioFile::from_yaml(HATFILE).unwrap();
        assert_eq!(scenario.suites[0].run_config(&scenario).hosts, scenario.hosts);
        assert_eq!(
            scenario.suites[1].run_config(&scenario).hosts,
            vec!["http://other:9000".to_string()]
        );
        assert!(!scenario.suites[1].run_config(&scenario).options.session);
    }

    #[test]
    fn test_json_file() {
        let json = r#"{"hosts": ["http://h"], "routes": [{"path": "/x", "response": 204}]}"#;
        let scenario = ScenarioFile::from_yaml(json).unwrap();
        assert_eq!(scenario.routes[0].response().code, 204);
        assert!(scenario.options.session);
        assert!(scenario.suites.is_empty());
    }

    #[test]
    fn test_empty_suites_key() {
        let scenario = ScenarioFile::from_yaml("hosts: []\nsuites:\n").unwrap();
        assert!(scenario.suites.is_empty());
    }

    #[test]
    fn test_host_without_scheme_rejected() {
        let err = ScenarioFile::from_yaml("hosts: [localhost:8080]").unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(ScenarioFile::from_yaml("options: { sesion: true }").is_err());
        assert!(ScenarioFile::from_yaml("hostz: []").is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = "suites:\n  smoke_test: {}\n  smoke-test: {}\n";
        let err = ScenarioFile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));

        let builtin = ScenarioFile::from_yaml("suites:\n  test_routes: {}\n").unwrap_err();
        assert!(builtin.to_string().contains("test_routes"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HATFILE.as_bytes()).unwrap();
        let scenario = ScenarioFile::from_file(file.path()).unwrap();
        assert_eq!(scenario.run_config().routes.len(), 2);
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        let err = ScenarioFile::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains(DEFAULT_FILE));
    }
}
