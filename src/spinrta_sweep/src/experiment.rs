//! Experiment description (`Experiment.toml`)
use serde::Deserialize;
use spinrta::{
    LockAssignment, LockDiscipline, LockOverheads, PartitionId, ResourceId, SpinlockPolicy, Task,
    TaskSet, Time,
};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ExperimentLoadError {
    #[error("Could not read {0:?}.")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Could not parse {0:?}.")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("The experiment doesn't define any tasks.")]
    NoTasks,
    #[error("The experiment doesn't define any locks.")]
    NoLocks,
    #[error("The lock '{0}' is defined more than once.")]
    DuplicateLock(String),
}

/// A task set parameterized by the period, and the locks to compare on it.
///
/// ```toml
/// [[task]]
/// cost = 500
/// partition = 0
/// requests = [{ resource = 0, count = 10, length = 50 }]
///
/// [[lock]]
/// name = "mcslock"
/// discipline = "fifo"
/// total_overhead = 148
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Experiment {
    /// In decreasing priority order.
    #[serde(rename = "task", default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(rename = "lock", default)]
    pub locks: Vec<LockSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TaskSpec {
    pub cost: Time,
    #[serde(default)]
    pub partition: PartitionId,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

/// `count` critical sections of length up to `length` issued per job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RequestSpec {
    pub resource: ResourceId,
    #[serde(default = "one")]
    pub count: u32,
    pub length: Time,
    #[serde(default)]
    pub kind: RequestKind,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RequestKind {
    Read,
    #[default]
    Write,
}

/// A lock implementation under comparison.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LockSpec {
    pub name: String,
    #[serde(deserialize_with = "deserialize_discipline")]
    pub discipline: LockDiscipline,
    #[serde(default)]
    pub total_overhead: Time,
    #[serde(default)]
    pub critical_overhead: Time,
    /// The resources protected by this lock. If omitted, the lock protects
    /// every resource.
    pub resources: Option<Vec<ResourceId>>,
}

fn one() -> u32 {
    1
}

fn deserialize_discipline<'de, D>(deserializer: D) -> Result<LockDiscipline, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

impl Experiment {
    /// Load an experiment from a TOML file.
    pub(crate) fn load(path: &Path) -> Result<Self, ExperimentLoadError> {
        log::debug!("Loading the experiment from '{}'", path.display());
        let data = std::fs::read_to_string(path)
            .map_err(|e| ExperimentLoadError::Read(path.to_owned(), e))?;
        let this: Self =
            toml::de::from_str(&data).map_err(|e| ExperimentLoadError::Parse(path.to_owned(), e))?;
        this.validate()?;
        Ok(this)
    }

    /// Three tasks of cost 500 on three processors sharing one resource, and
    /// a handful of spinlock implementations with measured overheads.
    pub(crate) fn builtin() -> Self {
        let task = |partition, count| TaskSpec {
            cost: 500,
            partition,
            requests: vec![RequestSpec {
                resource: 0,
                count,
                length: 50,
                kind: RequestKind::Write,
            }],
        };
        let lock = |name: &str, discipline, total_overhead| LockSpec {
            name: name.to_owned(),
            discipline,
            total_overhead,
            critical_overhead: 0,
            resources: None,
        };

        Self {
            tasks: vec![task(0, 10), task(1, 1), task(2, 1)],
            locks: vec![
                lock("optimispinlock", LockDiscipline::Unordered, 79),
                lock("spinlock", LockDiscipline::Unordered, 118),
                lock("mcslock", LockDiscipline::Fifo, 148),
                lock("ticketlock", LockDiscipline::Fifo, 179),
                lock("prioritylock", LockDiscipline::PriorityUnordered, 193),
            ],
        }
    }

    fn validate(&self) -> Result<(), ExperimentLoadError> {
        if self.tasks.is_empty() {
            return Err(ExperimentLoadError::NoTasks);
        }
        if self.locks.is_empty() {
            return Err(ExperimentLoadError::NoLocks);
        }
        for (i, lock) in self.locks.iter().enumerate() {
            if self.locks[..i].iter().any(|other| other.name == lock.name) {
                return Err(ExperimentLoadError::DuplicateLock(lock.name.clone()));
            }
        }
        Ok(())
    }

    /// Instantiate the task set with every task's period, deadline, and
    /// initial response time set to `period`.
    pub(crate) fn task_set(&self, period: Time) -> TaskSet {
        self.tasks
            .iter()
            .map(|spec| {
                let mut task = Task::new(spec.cost, period).on_partition(spec.partition);
                task.response_time = Some(period);
                for req in spec.requests.iter() {
                    let entry = task.request(req.resource);
                    for _ in 0..req.count {
                        match req.kind {
                            RequestKind::Read => entry.add_read_request(req.length),
                            RequestKind::Write => entry.add_request(req.length),
                        };
                    }
                }
                task
            })
            .collect()
    }
}

impl LockSpec {
    pub(crate) fn policy(&self) -> SpinlockPolicy {
        SpinlockPolicy::new(
            self.discipline,
            LockOverheads {
                total: self.total_overhead,
                critical: self.critical_overhead,
            },
        )
    }

    /// Build a fresh lock assignment in which this lock protects its
    /// resources. The rest are protected by a zero-overhead lock of the same
    /// discipline.
    pub(crate) fn assignment(&self) -> LockAssignment {
        let policy = self.policy();
        match &self.resources {
            None => LockAssignment::new(policy),
            Some(resources) => {
                let mut locks =
                    LockAssignment::new(SpinlockPolicy::new(self.discipline, Default::default()));
                for &resource in resources {
                    locks.protect_resource_with(resource, policy);
                }
                locks
            }
        }
    }
}
