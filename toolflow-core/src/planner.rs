//! Execution planning
//!
//! Turns a set of requested tool names into an [`ExecutionPlan`]:
//! a dependency-respecting linear order plus an ordered partition of that
//! order into groups whose members may run concurrently.
//!
//! Planning never fails fast. Every unregistered tool, missing dependency
//! and cycle found while walking the graph is collected into
//! [`PlanOutcome::issues`], so a caller gets the full diagnostic for a batch
//! in one pass.
//!
//! # Grouping
//!
//! Groups are built greedily, left to right over `order`: the first
//! ungrouped tool opens a group, and every later ungrouped tool whose
//! dependencies all sit in already closed groups joins it. This is not
//! maximum-parallelism scheduling, but it is deterministic for a given
//! order and never places a tool beside one of its dependencies.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::tools::{ToolDefinition, ToolRegistry};

/// Dependency-valid plan for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Linear order in which every dependency precedes its dependents
    pub order: Vec<String>,

    /// Ordered partition of `order` into concurrency groups
    pub parallel_groups: Vec<Vec<String>>,

    /// Sum of cost estimates (upper bound)
    pub estimated_cost: f64,

    /// Sum of timeouts (upper bound, not a wall-clock prediction)
    #[serde(with = "humantime_serde")]
    pub estimated_duration: Duration,
}

impl ExecutionPlan {
    /// Number of tools in the plan
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan has no tools
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the plan contains a tool
    pub fn contains(&self, tool: &str) -> bool {
        self.order.iter().any(|t| t == tool)
    }

    /// Index of the group a tool belongs to
    pub fn group_of(&self, tool: &str) -> Option<usize> {
        self.parallel_groups
            .iter()
            .position(|group| group.iter().any(|t| t == tool))
    }
}

/// Problem found while planning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanningIssue {
    /// A requested tool has no definition
    ToolNotRegistered { tool: String },

    /// A dependency has no definition
    MissingDependency { tool: String, dependency: String },

    /// The dependency graph loops back on itself
    CircularDependency { cycle: Vec<String> },
}

impl std::fmt::Display for PlanningIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanningIssue::ToolNotRegistered { tool } => {
                write!(f, "Tool '{}' is not registered", tool)
            }
            PlanningIssue::MissingDependency { tool, dependency } => {
                write!(f, "Tool '{}' depends on unregistered tool '{}'", tool, dependency)
            }
            PlanningIssue::CircularDependency { cycle } => {
                write!(f, "Circular dependency: {}", cycle.join(" -> "))
            }
        }
    }
}

/// Result of planning a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// The plan, present only when `valid`
    pub plan: Option<ExecutionPlan>,

    /// Whether planning found no issues
    pub valid: bool,

    /// Every issue found, in discovery order
    pub issues: Vec<PlanningIssue>,
}

impl PlanOutcome {
    fn valid(plan: ExecutionPlan) -> Self {
        Self {
            plan: Some(plan),
            valid: true,
            issues: Vec::new(),
        }
    }

    fn invalid(issues: Vec<PlanningIssue>) -> Self {
        Self {
            plan: None,
            valid: false,
            issues,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Depth-first walk state for one planning request
struct Walk<'a> {
    registry: &'a ToolRegistry,
    marks: HashMap<String, Mark>,
    path: Vec<String>,
    order: Vec<String>,
    issues: Vec<PlanningIssue>,
}

impl<'a> Walk<'a> {
    fn new(registry: &'a ToolRegistry) -> Self {
        Self {
            registry,
            marks: HashMap::new(),
            path: Vec::new(),
            order: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn report(&mut self, issue: PlanningIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    /// Walk everything reachable from `root`, dependencies first.
    ///
    /// Uses an explicit stack of `(definition, next dependency index)` frames
    /// so deep chains cannot exhaust the thread stack.
    fn visit(&mut self, root: &str) {
        let Some(definition) = self.enter(root, None) else {
            return;
        };
        let mut stack: Vec<(&'a ToolDefinition, usize)> = vec![(definition, 0)];

        while let Some(frame) = stack.last_mut() {
            let (definition, next) = *frame;
            if next < definition.dependencies.len() {
                frame.1 += 1;
                let dependency = &definition.dependencies[next];
                if let Some(child) = self.enter(dependency, Some(&definition.name)) {
                    stack.push((child, 0));
                }
            } else {
                stack.pop();
                self.leave(definition);
            }
        }
    }

    /// Mark `name` as in progress and return its definition, or `None` when
    /// it is already done, closes a cycle, or is not registered.
    fn enter(&mut self, name: &str, parent: Option<&str>) -> Option<&'a ToolDefinition> {
        match self.marks.get(name) {
            Some(Mark::Visited) => return None,
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle: Vec<String> = self.path[start..].to_vec();
                cycle.push(name.to_string());
                self.report(PlanningIssue::CircularDependency { cycle });
                return None;
            }
            None => {}
        }

        let registry = self.registry;
        let definition = match registry.get(name) {
            Ok(definition) => definition,
            Err(_) => {
                let issue = match parent {
                    Some(tool) => PlanningIssue::MissingDependency {
                        tool: tool.to_string(),
                        dependency: name.to_string(),
                    },
                    None => PlanningIssue::ToolNotRegistered {
                        tool: name.to_string(),
                    },
                };
                self.report(issue);
                return None;
            }
        };

        self.marks.insert(name.to_string(), Mark::Visiting);
        self.path.push(name.to_string());
        Some(definition)
    }

    fn leave(&mut self, definition: &ToolDefinition) {
        self.path.pop();
        self.marks.insert(definition.name.clone(), Mark::Visited);
        self.order.push(definition.name.clone());
    }
}

/// Builds execution plans from a registry
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPlanner<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> ExecutionPlanner<'a> {
    /// Create a planner over a registry
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Plan the requested tools and everything they depend on
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> PlanOutcome {
        let mut walk = Walk::new(self.registry);
        for name in requested {
            walk.visit(name.as_ref());
        }

        if !walk.issues.is_empty() {
            tracing::debug!(issues = walk.issues.len(), "Planning found issues");
            return PlanOutcome::invalid(walk.issues);
        }

        let order = walk.order;
        let definitions: HashMap<&str, &ToolDefinition> = order
            .iter()
            .filter_map(|name| self.registry.get(name).ok().map(|d| (name.as_str(), d)))
            .collect();

        let parallel_groups = group_greedily(&order, &definitions);
        let estimated_cost: f64 = definitions.values().map(|d| d.cost_estimate).sum();
        let estimated_duration: Duration = definitions.values().map(|d| d.timeout).sum();

        tracing::debug!(
            tools = order.len(),
            groups = parallel_groups.len(),
            "Planned execution"
        );

        PlanOutcome::valid(ExecutionPlan {
            order,
            parallel_groups,
            estimated_cost,
            estimated_duration,
        })
    }
}

/// Partition `order` into the greedy groups described in the module docs.
///
/// A tool lands in the first group after all of its dependencies, and group
/// members keep their relative position in `order`, which gives the same
/// partition as the left-to-right scan without rescanning the order per group.
fn group_greedily(order: &[String], definitions: &HashMap<&str, &ToolDefinition>) -> Vec<Vec<String>> {
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), index))
        .collect();

    // waiting[i]: distinct dependencies of order[i] not yet in a group
    let mut waiting = vec![0usize; order.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
    for (index, name) in order.iter().enumerate() {
        let Some(definition) = definitions.get(name.as_str()) else {
            continue;
        };
        let mut seen = HashSet::new();
        for dependency in &definition.dependencies {
            if let Some(&dep) = position.get(dependency.as_str())
                && seen.insert(dep)
            {
                waiting[index] += 1;
                dependents[dep].push(index);
            }
        }
    }

    let mut ready: Vec<usize> = (0..order.len()).filter(|&i| waiting[i] == 0).collect();
    let mut groups = Vec::new();

    while !ready.is_empty() {
        ready.sort_unstable();
        let mut next = Vec::new();
        for &index in &ready {
            for &dependent in &dependents[index] {
                waiting[dependent] -= 1;
                if waiting[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        groups.push(ready.iter().map(|&i| order[i].clone()).collect());
        ready = next;
    }

    groups
}
