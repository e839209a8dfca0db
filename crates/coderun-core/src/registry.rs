//! Runner registry: the static catalogue of sandbox specs.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU and memory ceiling of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimit {
    /// CPU share in hundredths of a core (10 = 0.1 CPU).
    pub cpu: i64,
    /// Memory ceiling in MiB.
    pub mem: i64,
}

impl ResourceLimit {
    /// CPU ceiling in the nano-CPU units Docker expects.
    ///
    /// `None` if the value does not fit in an `i64`.
    pub fn nano_cpus(&self) -> Option<i64> {
        self.cpu.checked_mul(10_000_000)
    }

    /// Memory ceiling in bytes, `None` on overflow.
    pub fn memory_bytes(&self) -> Option<i64> {
        self.mem.checked_mul(1024 * 1024)
    }
}

/// How to run one language's code in isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSpec {
    /// Runtime identifier; the registry key.
    #[serde(skip)]
    pub id: String,
    /// Image reference.
    pub image: String,
    /// Path the staged source is mounted at inside the unit.
    pub target: String,
    /// Starter program shown to clients.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    /// Launch command.
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<ResourceLimit>,
}

impl RunnerSpec {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Registry("runner id is required".into()));
        }
        if self.image.trim().is_empty() {
            return Err(CoreError::Registry(format!("{}: image is required", self.id)));
        }
        if self.cmd.is_empty() {
            return Err(CoreError::Registry(format!("{}: cmd must not be empty", self.id)));
        }
        if !self.target.starts_with('/') {
            return Err(CoreError::Registry(format!(
                "{}: target must be an absolute path",
                self.id
            )));
        }
        if let Some(limit) = &self.limit {
            if limit.cpu <= 0 || limit.mem <= 0 {
                return Err(CoreError::Registry(format!(
                    "{}: limits must be positive",
                    self.id
                )));
            }
            if limit.nano_cpus().is_none() || limit.memory_bytes().is_none() {
                return Err(CoreError::Registry(format!(
                    "{}: limits out of range",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

fn runner(
    id: &str,
    image: &str,
    target: &str,
    template: &str,
    cmd: &[&str],
    limit: ResourceLimit,
) -> RunnerSpec {
    RunnerSpec {
        id: id.to_string(),
        image: image.to_string(),
        target: target.to_string(),
        template: template.to_string(),
        cmd: cmd.iter().map(|s| s.to_string()).collect(),
        limit: Some(limit),
    }
}

/// Built-in runner catalogue.
fn builtin_runners() -> Vec<RunnerSpec> {
    vec![
        runner(
            "golang-latest",
            "golang:alpine",
            "/runner/main.go",
            r#"package main\nfunc main(){\nprint("hello world!")}"#,
            &[
                "sh",
                "-c",
                "set -x && cd /runner && go build -o main main.go && ./main",
            ],
            ResourceLimit { cpu: 10, mem: 50 },
        ),
        runner(
            "python-3",
            "python:3-alpine",
            "/runner/main.py",
            "print(\"hello world!\")\n",
            &["python3", "-u", "/runner/main.py"],
            ResourceLimit { cpu: 10, mem: 64 },
        ),
        runner(
            "node-lts",
            "node:lts-alpine",
            "/runner/main.js",
            "console.log(\"hello world!\");\n",
            &["node", "/runner/main.js"],
            ResourceLimit { cpu: 10, mem: 128 },
        ),
        runner(
            "bash",
            "bash:5",
            "/runner/main.sh",
            "echo \"hello world!\"\n",
            &["bash", "/runner/main.sh"],
            ResourceLimit { cpu: 10, mem: 32 },
        ),
        runner(
            "c-gcc",
            "gcc:latest",
            "/runner/main.c",
            "#include <stdio.h>\n\nint main(void) {\n    puts(\"hello world!\");\n    return 0;\n}\n",
            &[
                "sh",
                "-c",
                "cd /tmp && gcc -O2 -o main /runner/main.c && ./main",
            ],
            ResourceLimit { cpu: 20, mem: 256 },
        ),
    ]
}

/// Immutable map from runtime identifier to [`RunnerSpec`].
///
/// Built once at startup and shared behind an `Arc`; reads need no locking.
#[derive(Debug, Clone)]
pub struct RunnerRegistry {
    runners: BTreeMap<String, RunnerSpec>,
}

impl RunnerRegistry {
    /// Build a registry, rejecting duplicates and incomplete specs.
    pub fn new(specs: impl IntoIterator<Item = RunnerSpec>) -> Result<Self> {
        let mut runners = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            if runners.contains_key(&spec.id) {
                return Err(CoreError::Registry(format!("duplicate runner: {}", spec.id)));
            }
            runners.insert(spec.id.clone(), spec);
        }
        Ok(Self { runners })
    }

    /// The built-in catalogue.
    pub fn builtin() -> Self {
        let runners = builtin_runners()
            .into_iter()
            .map(|spec| (spec.id.clone(), spec))
            .collect();
        Self { runners }
    }

    /// Add or replace runners, e.g. from the server configuration.
    ///
    /// Map keys become the runner ids.
    pub fn merge(mut self, extra: impl IntoIterator<Item = (String, RunnerSpec)>) -> Result<Self> {
        for (id, mut spec) in extra {
            spec.id = id;
            spec.validate()?;
            let id = spec.id.clone();
            if self.runners.insert(id.clone(), spec).is_some() {
                tracing::debug!(runner = %id, "Runner overridden by configuration");
            }
        }
        Ok(self)
    }

    /// Look up a runner by identifier.
    pub fn lookup(&self, id: &str) -> Option<&RunnerSpec> {
        self.runners.get(id)
    }

    /// All runners, sorted by identifier.
    pub fn list(&self) -> impl Iterator<Item = &RunnerSpec> {
        self.runners.values()
    }

    /// The catalogue as an id → spec map.
    pub fn catalogue(&self) -> &BTreeMap<String, RunnerSpec> {
        &self.runners
    }

    /// Distinct images referenced by the catalogue.
    pub fn images(&self) -> Vec<&str> {
        let mut images: Vec<&str> = self.runners.values().map(|r| r.image.as_str()).collect();
        images.sort_unstable();
        images.dedup();
        images
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str) -> RunnerSpec {
        RunnerSpec {
            id: id.to_string(),
            image: "alpine:3".into(),
            target: "/runner/main.sh".into(),
            template: String::new(),
            cmd: vec!["sh".into(), "/runner/main.sh".into()],
            limit: None,
        }
    }

    #[test]
    fn test_builtin_runners_are_complete() {
        let registry = RunnerRegistry::builtin();
        assert!(!registry.is_empty());
        for runner in registry.list() {
            let found = registry.lookup(&runner.id).expect("lookup by own id");
            assert!(!found.image.is_empty(), "{} has no image", runner.id);
            assert!(!found.cmd.is_empty(), "{} has no cmd", runner.id);
            assert!(found.target.starts_with('/'));
            assert!(found.validate().is_ok());
        }
    }

    #[test]
    fn test_golang_runner() {
        let registry = RunnerRegistry::builtin();
        let go = registry.lookup("golang-latest").unwrap();
        assert_eq!(go.image, "golang:alpine");
        assert_eq!(go.target, "/runner/main.go");
        assert_eq!(go.cmd[0], "sh");
        assert_eq!(go.limit, Some(ResourceLimit { cpu: 10, mem: 50 }));
    }

    #[test]
    fn test_unknown_runner() {
        assert!(RunnerRegistry::builtin().lookup("cobol-85").is_none());
    }

    #[test]
    fn test_limit_conversion() {
        let limit = ResourceLimit { cpu: 10, mem: 50 };
        assert_eq!(limit.nano_cpus(), Some(100_000_000));
        assert_eq!(limit.memory_bytes(), Some(52_428_800));
    }

    #[test]
    fn test_limit_conversion_overflow() {
        let cpu = ResourceLimit {
            cpu: 1_000_000_000_000,
            mem: 10,
        };
        assert_eq!(cpu.nano_cpus(), None);
        let mem = ResourceLimit {
            cpu: 10,
            mem: i64::MAX / 2,
        };
        assert_eq!(mem.memory_bytes(), None);
    }

    #[test]
    fn test_new_rejects_oversized_limit() {
        let mut bad = spec("sh");
        bad.limit = Some(ResourceLimit {
            cpu: 1_000_000_000_000,
            mem: 10,
        });
        assert!(matches!(
            RunnerRegistry::new(vec![bad]),
            Err(CoreError::Registry(_))
        ));
    }

    #[test]
    fn test_merge_rejects_oversized_limit() {
        let mut bad = spec("ignored");
        bad.limit = Some(ResourceLimit {
            cpu: 10,
            mem: i64::MAX,
        });
        let result = RunnerRegistry::builtin().merge(vec![("huge".to_string(), bad)]);
        assert!(matches!(result, Err(CoreError::Registry(_))));
    }

    #[test]
    fn test_golang_template_text() {
        let registry = RunnerRegistry::builtin();
        let go = registry.lookup("golang-latest").unwrap();
        assert_eq!(
            go.template,
            "package main\\nfunc main(){\\nprint(\"hello world!\")}"
        );
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = RunnerRegistry::new(vec![spec("sh"), spec("sh")]);
        assert!(matches!(result, Err(CoreError::Registry(_))));
    }

    #[test]
    fn test_new_rejects_empty_cmd() {
        let mut bad = spec("sh");
        bad.cmd.clear();
        assert!(RunnerRegistry::new(vec![bad]).is_err());
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = RunnerRegistry::new(vec![spec("zsh"), spec("ash"), spec("ksh")]).unwrap();
        let ids: Vec<&str> = registry.list().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ash", "ksh", "zsh"]);
    }

    #[test]
    fn test_merge_overrides_and_adds() {
        let mut replacement = spec("ignored");
        replacement.image = "golang:1.22-alpine".into();

        let registry = RunnerRegistry::builtin()
            .merge(vec![
                ("golang-latest".to_string(), replacement),
                ("ash".to_string(), spec("ignored")),
            ])
            .unwrap();

        assert_eq!(registry.lookup("golang-latest").unwrap().image, "golang:1.22-alpine");
        assert_eq!(registry.lookup("ash").unwrap().id, "ash");
    }

    #[test]
    fn test_images_are_deduplicated() {
        let registry = RunnerRegistry::new(vec![spec("a"), spec("b")]).unwrap();
        assert_eq!(registry.images(), vec!["alpine:3"]);
    }

    #[test]
    fn test_serialized_shape() {
        let registry = RunnerRegistry::builtin();
        let json = serde_json::to_value(registry.catalogue()).unwrap();
        let go = &json["golang-latest"];
        assert_eq!(go["image"], "golang:alpine");
        assert_eq!(go["limit"]["cpu"], 10);
        assert!(go.get("id").is_none());
    }
}
