//! Conversion chains: multi-hop paths between CRD versions
//!
//! Each CRD gets a [`Chain`] seeded with the conversion rules declared by
//! hooks. When Kubernetes asks for a conversion with no declared rule, the
//! chain is expanded round by round until a path of declared rules connects
//! the source version with the desired version, or until no new path appears.
//!
//! Versions are compared with [`versions_matched`], so a short version (`v1`)
//! and a group-qualified version (`example.com/v1`) are interchangeable.
//! Discovered paths are memoized and never evicted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use super::rule::{ConversionRule, RULE_SEPARATOR};
use super::version::{is_qualified, trim_group, versions_matched};

/// Discovered conversion edges and paths for one CRD
#[derive(Debug, Clone, Default)]
pub struct Chain {
    /// Rule id (`from->to`) to the sequence of declared rule ids that performs it
    paths_cache: BTreeMap<String, Vec<String>>,
    /// Declared edges: from version to the set of to versions
    from_to_cache: BTreeMap<String, BTreeSet<String>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the chain with a declared rule
    pub fn put(&mut self, rule: &ConversionRule) {
        let id = rule.id();
        self.paths_cache.insert(id.clone(), vec![id]);
        self.from_to_cache
            .entry(rule.from_version.clone())
            .or_default()
            .insert(rule.to_version.clone());
    }

    /// Number of memoized paths, declared and discovered
    pub fn paths_len(&self) -> usize {
        self.paths_cache.len()
    }

    /// Number of declared edges
    pub fn edges_len(&self) -> usize {
        self.from_to_cache.values().map(BTreeSet::len).sum()
    }

    /// Memoized path for an exact rule id
    pub fn cached_path(&self, rule_id: &str) -> Option<&[String]> {
        self.paths_cache.get(rule_id).map(Vec::as_slice)
    }

    /// Find a path of declared rules that converts `rule.from_version` to
    /// `rule.to_version`, expanding the cache as needed
    ///
    /// Returns `None` if no such path can be derived.
    pub fn find_path(&mut self, rule: &ConversionRule) -> Option<Vec<String>> {
        // Without an edge into the desired version the search cannot end.
        if !self.has_target_version(&rule.to_version) {
            return None;
        }

        let mut round = 0usize;
        loop {
            if let Some(path) = self.search_path_for_rule(rule) {
                return Some(path.to_vec());
            }

            round += 1;
            let new_paths = self.expand(rule);
            if new_paths.is_empty() {
                debug!(rule = %rule, rounds = round, "No conversion path found");
                return None;
            }

            debug!(
                rule = %rule,
                round = round,
                discovered = new_paths.len(),
                "Expanded conversion paths"
            );
            self.paths_cache.extend(new_paths);
        }
    }

    /// One expansion round: extend every path that starts at the source
    /// version by one declared edge
    fn expand(&self, rule: &ConversionRule) -> BTreeMap<String, Vec<String>> {
        let mut new_paths = BTreeMap::new();
        let short_from = rule.short_from_version();

        for id_to_check in self.ids_by_from_version(rule) {
            let rule_to_check = ConversionRule::from_id(id_to_check);

            // A path back to the source is a loop.
            if rule_to_check.short_to_version() == short_from {
                continue;
            }

            let Some(base_path) = self.paths_cache.get(id_to_check) else {
                continue;
            };

            for next_rule in self.next_rules(&rule_to_check.to_version) {
                let new_rule =
                    ConversionRule::new(rule.from_version.clone(), next_rule.to_version.clone());

                if new_rule.short_to_version() == short_from {
                    continue;
                }

                if self.search_path_for_rule(&new_rule).is_some() {
                    continue;
                }

                let mut new_path = base_path.clone();
                new_path.push(next_rule.id());
                new_paths.insert(new_rule.id(), new_path);
            }
        }

        new_paths
    }

    /// Look up a memoized path for a rule
    ///
    /// An exact id match wins. Otherwise, among the rules whose versions both
    /// match the query, prefer one equal to the query on both qualified ends,
    /// then one equal on the qualified to version, then one equal on the
    /// qualified from version, then the first one.
    pub fn search_path_for_rule(&self, rule: &ConversionRule) -> Option<&[String]> {
        if let Some(path) = self.paths_cache.get(&rule.id()) {
            return Some(path.as_slice());
        }

        let ids: Vec<(&String, ConversionRule)> = self
            .paths_cache
            .keys()
            .map(|id| (id, ConversionRule::from_id(id)))
            .filter(|(_, r)| {
                versions_matched(&rule.to_version, &r.to_version)
                    && versions_matched(&rule.from_version, &r.from_version)
            })
            .collect();

        let qualified_from = is_qualified(&rule.from_version);
        let qualified_to = is_qualified(&rule.to_version);

        let mut from_match = None;
        let mut to_match = None;
        for (id, r) in &ids {
            let from_equal = qualified_from && r.from_version == rule.from_version;
            let to_equal = qualified_to && r.to_version == rule.to_version;
            if from_equal && to_equal {
                return self.cached_path(id);
            }
            if from_equal && from_match.is_none() {
                from_match = Some(*id);
            }
            if to_equal && to_match.is_none() {
                to_match = Some(*id);
            }
        }

        to_match
            .or(from_match)
            .or_else(|| ids.first().map(|(id, _)| *id))
            .and_then(|id| self.cached_path(id))
    }

    /// Memoized rule ids that contain the short source version before the
    /// separator
    ///
    /// This is a substring match: `v1` also selects ids starting with `v10`.
    pub fn ids_by_from_version(&self, rule: &ConversionRule) -> Vec<&str> {
        let short_from = rule.short_from_version();
        self.paths_cache
            .keys()
            .filter(|id| match (id.find(short_from), id.find(RULE_SEPARATOR)) {
                (Some(idx_from), Some(idx_sep)) => idx_from < idx_sep,
                _ => false,
            })
            .map(String::as_str)
            .collect()
    }

    /// Declared edges that start at `from_version`
    ///
    /// Sources are selected by exact match, or by containing the short form
    /// of `from_version` as a substring.
    pub fn next_rules(&self, from_version: &str) -> Vec<ConversionRule> {
        let short = trim_group(from_version);
        self.from_to_cache
            .iter()
            .filter(|(from, _)| from.as_str() == from_version || from.contains(short))
            .flat_map(|(from, tos)| {
                tos.iter()
                    .map(move |to| ConversionRule::new(from.clone(), to.clone()))
            })
            .collect()
    }

    /// Check if any declared edge ends at a version matching `to_version`
    pub fn has_target_version(&self, to_version: &str) -> bool {
        self.from_to_cache
            .values()
            .flatten()
            .any(|to| versions_matched(to_version, to))
    }
}

/// Conversion chains for all CRDs, created on first access
#[derive(Debug, Default)]
pub struct ChainStorage {
    chains: HashMap<String, Chain>,
}

impl ChainStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the chain for a CRD, creating an empty one if absent
    pub fn get(&mut self, crd_name: &str) -> &mut Chain {
        self.chains.entry(crd_name.to_string()).or_default()
    }

    /// Get the chain for a CRD without creating it
    pub fn chain(&self, crd_name: &str) -> Option<&Chain> {
        self.chains.get(crd_name)
    }

    /// Seed the chain of a CRD with a declared rule
    pub fn put(&mut self, crd_name: &str, rule: &ConversionRule) {
        self.get(crd_name).put(rule);
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Find a sequence of declared rule ids converting `rule.from_version`
    /// to `rule.to_version` for a CRD
    ///
    /// Returns `None` for an unknown CRD or an unreachable version.
    pub fn find_conversion_chain(
        &mut self,
        crd_name: &str,
        rule: &ConversionRule,
    ) -> Option<Vec<String>> {
        self.chains.get_mut(crd_name)?.find_path(rule)
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;
