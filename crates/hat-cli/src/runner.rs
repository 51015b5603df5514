//! Named tests: the builtin `test-routes` plus one test per suite.

use crate::scenario::{ScenarioFile, Suite};
use hat_engine::{
    select_hosts, select_routes, CollectionResult, Outcome, RunConfig, ScalarResult,
};
use tracing::{debug, info};

pub const BUILTIN_TEST: &str = "test-routes";

const BUILTIN_DOC: &str = "Run the top-level routes against the configured hosts.";

/// Names match with `-` and `_` treated as the same character.
pub fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Arguments accepted by tests on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestArgs {
    /// 1-based route indices, comma separated. Builtin test only.
    pub route: Option<String>,
    /// Comma separated hosts replacing the configured ones.
    pub host: Option<String>,
    /// Overrides the scenario's `options.session`.
    pub session: Option<bool>,
}

/// A test that can be looked up by name.
#[derive(Debug, Clone, Copy)]
pub enum NamedTest<'a> {
    Builtin,
    Suite(&'a Suite),
}

impl NamedTest<'_> {
    pub fn name(&self) -> &str {
        match self {
            NamedTest::Builtin => BUILTIN_TEST,
            NamedTest::Suite(suite) => &suite.name,
        }
    }
}

type Outcomes<'a> = Box<dyn Iterator<Item = Outcome> + 'a>;

pub struct Runner<'a> {
    scenario: &'a ScenarioFile,
    args: TestArgs,
}

impl<'a> Runner<'a> {
    pub fn new(scenario: &'a ScenarioFile, args: TestArgs) -> Self {
        Self { scenario, args }
    }

    /// Tests in declaration order, builtin first unless ignored.
    pub fn tests(&self) -> Vec<NamedTest<'a>> {
        let mut tests = Vec::with_capacity(self.scenario.suites.len() + 1);
        if !self.scenario.ignore_builtin {
            tests.push(NamedTest::Builtin);
        }
        tests.extend(self.scenario.suites.iter().map(NamedTest::Suite));
        tests
    }

    /// Look a test up by name. The builtin can always be run explicitly.
    pub fn find(&self, name: &str) -> Option<NamedTest<'a>> {
        let wanted = normalize_name(name);
        if wanted == BUILTIN_TEST {
            return Some(NamedTest::Builtin);
        }
        self.scenario
            .suites
            .iter()
            .find(|suite| normalize_name(&suite.name) == wanted)
            .map(NamedTest::Suite)
    }

    /// Run one test by name. Results are produced as they are pulled.
    pub fn run(&self, name: &str) -> Outcomes<'a> {
        match self.find(name) {
            Some(test) => self.run_test(test),
            None => Box::new(std::iter::once(Outcome::from(ScalarResult::new(
                format!("Test '{name}' not found"),
                false,
            )))),
        }
    }

    /// Run every test in order.
    pub fn run_all(&self) -> Outcomes<'a> {
        let runner = Runner::new(self.scenario, self.args.clone());
        Box::new(
            self.tests()
                .into_iter()
                .flat_map(move |test| runner.run_test(test)),
        )
    }

    fn run_test(&self, test: NamedTest<'a>) -> Outcomes<'a> {
        info!(test = test.name(), "running test");
        match test {
            NamedTest::Builtin => self.run_builtin(),
            NamedTest::Suite(suite) => self.run_suite(suite),
        }
    }

    fn run_builtin(&self) -> Outcomes<'a> {
        let base = self.scenario.run_config();
        let routes = match select_routes(self.args.route.as_deref(), &base.routes) {
            Ok(routes) => routes,
            Err(err) => return failure(BUILTIN_TEST, err.to_string()),
        };
        let config = RunConfig {
            hosts: select_hosts(self.args.host.as_deref(), &base.hosts),
            routes,
            options: base.options,
        };
        self.visit(BUILTIN_TEST, config)
    }

    fn run_suite(&self, suite: &'a Suite) -> Outcomes<'a> {
        let mut config = suite.run_config(self.scenario);
        config.hosts = select_hosts(self.args.host.as_deref(), &config.hosts);

        let name = suite.name.clone();
        let results: Vec<Outcome> = self.visit(&name, config).collect();
        Box::new(std::iter::once(Outcome::from(CollectionResult::new(name, results))))
    }

    fn visit(&self, name: &str, mut config: RunConfig) -> Outcomes<'a> {
        if let Some(session) = self.args.session {
            config.options.session = session;
        }
        debug!(
            test = name,
            hosts = config.hosts.len(),
            routes = config.routes.len(),
            session = config.options.session,
            "visiting"
        );
        match config.visit() {
            Ok(traversal) => Box::new(traversal.map(Outcome::from)),
            Err(err) => failure(name, err.to_string()),
        }
    }

    /// Help lines for one test or, with no name, every listed test.
    pub fn help(&self, name: Option<&str>, long: bool) -> Vec<String> {
        let tests = match name {
            Some(name) => match self.find(name) {
                Some(test) => vec![test],
                None => return vec![format!("Test not found: '{name}'")],
            },
            None => self.tests(),
        };

        tests
            .into_iter()
            .flat_map(|test| self.test_help(test, long))
            .collect()
    }

    fn test_help(&self, test: NamedTest<'a>, long: bool) -> Vec<String> {
        let (doc, routes, hosts) = match test {
            NamedTest::Builtin => (Some(BUILTIN_DOC), &self.scenario.routes, &self.scenario.hosts),
            NamedTest::Suite(suite) => (
                suite.doc.as_deref(),
                &suite.routes,
                suite.hosts.as_ref().unwrap_or(&self.scenario.hosts),
            ),
        };

        let mut lines = vec![test.name().to_string()];
        if !long {
            lines.push("  routes:".to_string());
            lines.extend(routes.iter().map(|route| format!("    {route}")));
            lines.push("  hosts:".to_string());
            lines.extend(hosts.iter().map(|host| format!("    {host}")));
            return lines;
        }

        if let Some(doc) = doc {
            lines.extend(doc.lines().map(|line| format!("  {line}")));
        }
        lines.push("  routes:".to_string());
        for (i, route) in routes.iter().enumerate() {
            lines.push(format!("   {:2}. {route}", i + 1));
            if route.doc().is_some() {
                lines.push(format!("      {} {}", route.path(), route.method()));
            }
        }
        lines.push("  hosts:".to_string());
        for (i, host) in hosts.iter().enumerate() {
            lines.push(format!("   {:2}. {host}", i + 1));
        }
        lines
    }
}

fn failure<'a>(name: &str, message: String) -> Outcomes<'a> {
    Box::new(std::iter::once(Outcome::from(ScalarResult::failure(
        format!("{name}: "),
        message,
    ))))
}
