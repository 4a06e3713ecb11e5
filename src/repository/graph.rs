// src/repository/graph.rs

//! Dependency graph between the recipes of one repository
//!
//! Edges run from a recipe to every in-repository package it may depend on,
//! under any condition. Externals never appear as nodes. All collections are
//! ordered so that build orders and cycle reports are stable across loads.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::validate::{Violation, ViolationKind};

/// A directed graph of recipe dependencies
#[derive(Debug, Clone, Default)]
pub struct RecipeGraph {
    /// Recipe name to the recipes it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Recipe name to the recipes that depend on it
    reverse_edges: BTreeMap<String, BTreeSet<String>>,
}

impl RecipeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe with its dependencies, merging with any earlier edges
    pub fn add_recipe<'a>(&mut self, name: &str, dependencies: impl IntoIterator<Item = &'a str>) {
        self.edges.entry(name.to_string()).or_default();
        self.reverse_edges.entry(name.to_string()).or_default();

        for dep in dependencies {
            self.edges.entry(dep.to_string()).or_default();
            self.reverse_edges
                .entry(dep.to_string())
                .or_default()
                .insert(name.to_string());
            self.edges
                .entry(name.to_string())
                .or_default()
                .insert(dep.to_string());
        }
    }

    pub fn recipe_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Direct dependencies of a recipe
    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(name)
    }

    /// Recipes that directly depend on this one
    pub fn dependents(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.reverse_edges.get(name)
    }

    /// Kahn's algorithm; dependencies come before their dependents
    ///
    /// Among recipes that are ready at the same time, names sort
    /// alphabetically.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degrees: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut ready: BTreeSet<&str> = in_degrees
            .iter()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.edges.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());
            let Some(dependents) = self.reverse_edges.get(node) else {
                continue;
            };
            for dependent in dependents {
                if let Some(deg) = in_degrees.get_mut(dependent.as_str()) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            let violations = self
                .find_cycles()
                .into_iter()
                .map(|cycle| Violation::new(cycle[0].clone(), ViolationKind::DependencyCycle { cycle }))
                .collect();
            return Err(Error::RepositoryValidation { violations });
        }

        Ok(order)
    }

    /// Every elementary cycle reachable by depth-first search
    ///
    /// Each cycle is rotated to start at its alphabetically smallest member,
    /// and duplicates are dropped.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        let mut path = Vec::new();

        for start in self.edges.keys() {
            if !visited.contains(start.as_str()) {
                self.find_cycles_dfs(start, &mut visited, &mut stack, &mut path, &mut cycles);
            }
        }

        cycles.into_iter().collect()
    }

    fn find_cycles_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut BTreeSet<&'a str>,
        stack: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut BTreeSet<Vec<String>>,
    ) {
        visited.insert(node);
        stack.insert(node);
        path.push(node);

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep.as_str()) {
                    self.find_cycles_dfs(dep, visited, stack, path, cycles);
                } else if stack.contains(dep.as_str())
                    && let Some(start) = path.iter().position(|p| *p == dep.as_str())
                {
                    cycles.insert(normalize_cycle(&path[start..]));
                }
            }
        }

        path.pop();
        stack.remove(node);
    }

    /// Every recipe that depends on `name`, directly or not
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        walk(&self.reverse_edges, name)
    }

    /// Every recipe `name` depends on, directly or not
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        walk(&self.edges, name)
    }
}

fn walk(edges: &BTreeMap<String, BTreeSet<String>>, name: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&String> = edges.get(name).into_iter().flatten().collect();

    while let Some(next) = queue.pop_front() {
        if seen.insert(next.clone())
            && let Some(more) = edges.get(next)
        {
            queue.extend(more.iter().filter(|m| !seen.contains(*m)));
        }
    }
    seen
}

fn normalize_cycle(cycle: &[&str]) -> Vec<String> {
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| **name)
        .map_or(0, |(i, _)| i);
    cycle[pivot..]
        .iter()
        .chain(&cycle[..pivot])
        .map(|s| s.to_string())
        .collect()
}
