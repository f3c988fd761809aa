//! Organism registry - owns organisms, the lineage forest and the species index.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use helix_core::{Organism, OrganismId, INITIAL_VERSION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::genome::species_key;
use crate::mutation::MutationSpec;
use crate::snapshot::{OrganismSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::{RegistryError, Result};

/// Default author for registered organisms.
pub const DEFAULT_AUTHOR: &str = "system";

/// Author recorded on organisms produced by [`OrganismRegistry::evolve`].
pub const EVOLUTION_AUTHOR: &str = "evolution";

/// Registration request.
#[derive(Debug, Clone)]
pub struct NewOrganism {
    /// Display name
    pub name: String,
    /// Genetic code text
    pub genetic_code: String,
    /// Author
    pub author: String,
    /// Parent organism, if derived
    pub parent_id: Option<OrganismId>,
    /// Additional metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewOrganism {
    /// Create a root registration request.
    pub fn new(name: impl Into<String>, genetic_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            genetic_code: genetic_code.into(),
            author: DEFAULT_AUTHOR.to_string(),
            parent_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Derive from a parent.
    pub fn parent(mut self, parent_id: OrganismId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Mutable organism fields. Anything not listed here is fixed at registration.
#[derive(Debug, Clone, Default)]
pub struct OrganismPatch {
    /// New fitness
    pub fitness: Option<f64>,
    /// New consciousness level
    pub consciousness_level: Option<f64>,
    /// Replacement tag list
    pub tags: Option<Vec<String>>,
    /// Replacement compiled circuit
    pub circuit_qasm: Option<String>,
    /// Replacement metadata
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

/// Search filters; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring of name or genetic code
    pub text: Option<String>,
    /// Minimum fitness
    pub min_fitness: Option<f64>,
    /// Maximum generation
    pub max_generation: Option<u32>,
    /// Match organisms carrying any of these tags
    pub tags: Vec<String>,
    /// Exact author
    pub author: Option<String>,
}

/// Ranking metric for [`OrganismRegistry::top_organisms`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// Highest fitness first
    Fitness,
    /// Highest consciousness level first
    Consciousness,
    /// Deepest generation first
    Generation,
    /// Most recently updated first
    Recent,
}

/// Registry-wide statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStatistics {
    /// Number of organisms
    pub total_organisms: usize,
    /// Number of species buckets
    pub species_count: usize,
    /// Mean fitness
    pub average_fitness: f64,
    /// Best fitness
    pub max_fitness: f64,
    /// Mean generation
    pub average_generation: f64,
    /// Deepest generation
    pub max_generation: u32,
    /// Mean consciousness level
    pub average_consciousness: f64,
    /// Normalized Shannon diversity
    pub diversity_index: f64,
    /// Distinct authors, sorted
    pub authors: Vec<String>,
    /// Organisms with at least one child
    pub total_lineages: usize,
}

/// Registry for organisms and their derivation forest.
///
/// This is a plain repository object: mutation takes `&mut self`, and callers
/// sharing it across tasks wrap it in a lock.
pub struct OrganismRegistry {
    organisms: HashMap<OrganismId, Organism>,
    species: BTreeMap<String, Vec<OrganismId>>,
    evolution_tree: HashMap<OrganismId, Vec<OrganismId>>,
}

impl OrganismRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            organisms: HashMap::new(),
            species: BTreeMap::new(),
            evolution_tree: HashMap::new(),
        }
    }

    /// Register an organism, returning its fresh id.
    pub fn register(&mut self, request: NewOrganism) -> Result<OrganismId> {
        if request.name.trim().is_empty() {
            return Err(RegistryError::Validation("organism name is empty".into()));
        }
        if request.genetic_code.trim().is_empty() {
            return Err(RegistryError::Validation("genetic code is empty".into()));
        }

        let id = OrganismId::new();
        let now = chrono::Utc::now();

        let parent = request.parent_id.as_ref().and_then(|pid| self.organisms.get(pid));
        let (lineage, generation) = match parent {
            Some(parent) => {
                let mut lineage = parent.lineage.clone();
                lineage.push(parent.id.clone());
                (lineage, parent.generation + 1)
            }
            None => {
                if let Some(pid) = &request.parent_id {
                    warn!("Parent {} not found, registering {} as a root", pid, request.name);
                }
                (Vec::new(), 0)
            }
        };

        if let Some(parent_id) = lineage.last() {
            self.evolution_tree
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone());
        }

        let species = species_key(&request.genetic_code);
        self.species.entry(species.clone()).or_default().push(id.clone());

        let organism = Organism {
            id: id.clone(),
            name: request.name,
            genetic_code: request.genetic_code,
            version: INITIAL_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            author: request.author,
            consciousness_level: 0.0,
            fitness: 0.0,
            generation,
            lineage,
            tags: Vec::new(),
            circuit_qasm: None,
            metadata: request.metadata,
        };

        info!(
            "Registered organism {} ({}) species={} generation={}",
            organism.name, id, species, generation
        );
        self.organisms.insert(id.clone(), organism);
        Ok(id)
    }

    /// Derive a child of `parent_id` by applying `mutations` to its genetic code.
    pub fn evolve(
        &mut self,
        parent_id: &OrganismId,
        mutations: &MutationSpec,
    ) -> Result<OrganismId> {
        let parent = self
            .organisms
            .get(parent_id)
            .ok_or_else(|| RegistryError::NotFound(parent_id.clone()))?;

        let evolved_code = mutations.apply(&parent.genetic_code)?;
        let mutations_json = serde_json::to_value(mutations)
            .map_err(|e| RegistryError::Validation(format!("unserializable mutations: {}", e)))?;

        let request = NewOrganism::new(
            format!("{}_gen{}", parent.name, parent.generation + 1),
            evolved_code,
        )
        .author(EVOLUTION_AUTHOR)
        .parent(parent_id.clone())
        .metadata("mutations", mutations_json)
        .metadata("parent_fitness", serde_json::json!(parent.fitness))
        .metadata(
            "evolution_timestamp",
            serde_json::json!(chrono::Utc::now().to_rfc3339()),
        );

        let child = self.register(request)?;
        info!("Evolved {} -> {}", parent_id, child);
        Ok(child)
    }

    /// Apply an allow-listed patch. Returns false for unknown organisms.
    /// Non-finite scores are skipped and the previous value kept.
    pub fn update(&mut self, id: &OrganismId, patch: OrganismPatch) -> bool {
        let Some(organism) = self.organisms.get_mut(id) else {
            return false;
        };

        match patch.fitness {
            Some(fitness) if fitness.is_finite() => organism.fitness = fitness,
            Some(fitness) => warn!("Ignoring non-finite fitness {} for {}", fitness, id),
            None => {}
        }
        match patch.consciousness_level {
            Some(level) if level.is_finite() => organism.consciousness_level = level,
            Some(level) => warn!("Ignoring non-finite consciousness level {} for {}", level, id),
            None => {}
        }
        if let Some(tags) = patch.tags {
            organism.tags = tags;
        }
        if let Some(qasm) = patch.circuit_qasm {
            organism.circuit_qasm = Some(qasm);
        }
        if let Some(metadata) = patch.metadata {
            organism.metadata = metadata;
        }
        organism.updated_at = chrono::Utc::now();
        debug!("Updated organism {}", id);
        true
    }

    /// Get an organism by ID.
    pub fn get(&self, id: &OrganismId) -> Option<&Organism> {
        self.organisms.get(id)
    }

    /// Number of organisms.
    pub fn len(&self) -> usize {
        self.organisms.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.organisms.is_empty()
    }

    /// Species key of an organism.
    pub fn species_of(&self, id: &OrganismId) -> Option<String> {
        self.organisms.get(id).map(|o| species_key(&o.genetic_code))
    }

    /// Members of a species, in registration order.
    pub fn species_members(&self, species: &str) -> Vec<&Organism> {
        self.species
            .get(species)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|id| self.organisms.get(id)))
            .collect()
    }

    /// Population per species.
    pub fn species_counts(&self) -> BTreeMap<String, usize> {
        self.species
            .iter()
            .map(|(species, ids)| (species.clone(), ids.len()))
            .collect()
    }

    /// Search organisms, best fitness first.
    pub fn search(&self, filter: &SearchFilter) -> Vec<&Organism> {
        let text = filter.text.as_ref().map(|t| t.to_lowercase());

        let mut results: Vec<&Organism> = self
            .organisms
            .values()
            .filter(|o| {
                if let Some(text) = &text {
                    if !o.name.to_lowercase().contains(text)
                        && !o.genetic_code.to_lowercase().contains(text)
                    {
                        return false;
                    }
                }
                if filter.min_fitness.is_some_and(|min| o.fitness < min) {
                    return false;
                }
                if filter.max_generation.is_some_and(|max| o.generation > max) {
                    return false;
                }
                if !filter.tags.is_empty() && !filter.tags.iter().any(|t| o.tags.contains(t)) {
                    return false;
                }
                if filter.author.as_ref().is_some_and(|a| &o.author != a) {
                    return false;
                }
                true
            })
            .collect();

        results.sort_by(|a, b| {
            desc_f64(a.fitness, b.fitness).then_with(|| registration_order(a, b))
        });
        results
    }

    /// Ancestors of an organism, root first.
    pub fn lineage(&self, id: &OrganismId) -> Vec<&Organism> {
        self.organisms
            .get(id)
            .map(|o| {
                o.lineage
                    .iter()
                    .filter_map(|ancestor| self.organisms.get(ancestor))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every descendant of an organism, depth-first in child order.
    ///
    /// Walks the evolution tree with an explicit stack so deep lineages do not
    /// grow the call stack.
    pub fn descendants(&self, id: &OrganismId) -> Vec<&Organism> {
        let mut result = Vec::new();
        let mut stack: Vec<&OrganismId> = Vec::new();

        if let Some(children) = self.evolution_tree.get(id) {
            stack.extend(children.iter().rev());
        }
        while let Some(current) = stack.pop() {
            let Some(organism) = self.organisms.get(current) else { continue };
            result.push(organism);
            if let Some(children) = self.evolution_tree.get(current) {
                stack.extend(children.iter().rev());
            }
        }
        result
    }

    /// Direct children of an organism, in creation order.
    pub fn children(&self, id: &OrganismId) -> Vec<&Organism> {
        self.evolution_tree
            .get(id)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|c| self.organisms.get(c)))
            .collect()
    }

    /// Top organisms by `metric`.
    pub fn top_organisms(&self, metric: RankMetric, limit: usize) -> Vec<&Organism> {
        let mut organisms: Vec<&Organism> = self.organisms.values().collect();
        organisms.sort_by(|a, b| {
            let primary = match metric {
                RankMetric::Fitness => desc_f64(a.fitness, b.fitness),
                RankMetric::Consciousness => desc_f64(a.consciousness_level, b.consciousness_level),
                RankMetric::Generation => b.generation.cmp(&a.generation),
                RankMetric::Recent => b.updated_at.cmp(&a.updated_at),
            };
            primary.then_with(|| registration_order(a, b))
        });
        organisms.truncate(limit);
        organisms
    }

    /// Normalized Shannon entropy of the species distribution.
    ///
    /// 0 for an empty or single-species population, 1 when every species has
    /// the same population.
    pub fn diversity_index(&self) -> f64 {
        let counts: Vec<usize> = self.species.values().map(Vec::len).filter(|&c| c > 0).collect();
        let total: usize = counts.iter().sum();
        if total == 0 || counts.len() < 2 {
            return 0.0;
        }

        let total = total as f64;
        let entropy: f64 = counts
            .iter()
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.ln()
            })
            .sum();
        entropy / (counts.len() as f64).ln()
    }

    /// Export an organism with its ancestor chain.
    pub fn export(&self, id: &OrganismId) -> Result<OrganismSnapshot> {
        let organism = self
            .organisms
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        Ok(OrganismSnapshot {
            organism: organism.clone(),
            lineage: self.lineage(id).into_iter().cloned().collect(),
            hash: organism.content_hash(),
            export_timestamp: chrono::Utc::now(),
            format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
        })
    }

    /// Import a snapshot under fresh ids.
    ///
    /// With `preserve_lineage` the exported ancestors are imported first,
    /// root first, each as the child of the previous one, so the imported
    /// organism ends up with a rebuilt lineage. Otherwise it is a new root.
    pub fn import(
        &mut self,
        snapshot: &OrganismSnapshot,
        preserve_lineage: bool,
    ) -> Result<OrganismId> {
        snapshot.verify()?;

        let mut parent: Option<OrganismId> = None;
        if preserve_lineage {
            for ancestor in &snapshot.lineage {
                parent = Some(self.import_one(ancestor, parent.take())?);
            }
        }
        let id = self.import_one(&snapshot.organism, parent)?;
        info!("Imported organism {} as {}", snapshot.organism.id, id);
        Ok(id)
    }

    fn import_one(&mut self, source: &Organism, parent: Option<OrganismId>) -> Result<OrganismId> {
        let mut request = NewOrganism::new(source.name.clone(), source.genetic_code.clone())
            .author(source.author.clone());
        request.metadata = source.metadata.clone();
        request
            .metadata
            .insert("imported_from".to_string(), serde_json::json!(source.id.as_str()));
        request.parent_id = parent;

        let id = self.register(request)?;
        self.update(
            &id,
            OrganismPatch {
                fitness: Some(source.fitness),
                consciousness_level: Some(source.consciousness_level),
                tags: Some(source.tags.clone()),
                circuit_qasm: source.circuit_qasm.clone(),
                metadata: None,
            },
        );
        if let Some(organism) = self.organisms.get_mut(&id) {
            organism.version = source.version.clone();
        }
        Ok(id)
    }

    /// Registry-wide statistics.
    pub fn statistics(&self) -> RegistryStatistics {
        let total = self.organisms.len();
        if total == 0 {
            return RegistryStatistics::default();
        }

        let n = total as f64;
        let organisms = self.organisms.values();
        let mut authors: Vec<String> = organisms.clone().map(|o| o.author.clone()).collect();
        authors.sort();
        authors.dedup();

        RegistryStatistics {
            total_organisms: total,
            species_count: self.species.len(),
            average_fitness: organisms.clone().map(|o| o.fitness).sum::<f64>() / n,
            max_fitness: organisms.clone().map(|o| o.fitness).fold(f64::MIN, f64::max),
            average_generation: organisms.clone().map(|o| o.generation as f64).sum::<f64>() / n,
            max_generation: organisms.clone().map(|o| o.generation).max().unwrap_or(0),
            average_consciousness: organisms.map(|o| o.consciousness_level).sum::<f64>() / n,
            diversity_index: self.diversity_index(),
            authors,
            total_lineages: self.evolution_tree.len(),
        }
    }
}

impl Default for OrganismRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn desc_f64(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn registration_order(a: &Organism, b: &Organism) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;

    const SEED: &str =
        "ORGANISM Aurora {\n  coherence: 0.5\n  depth: 12\n  gates: [h, cx]\n  ry(0.25) q1\n}\n";

    fn seed(registry: &mut OrganismRegistry) -> OrganismId {
        registry.register(NewOrganism::new("aurora", SEED)).unwrap()
    }

    #[test]
    fn test_register_root() {
        let mut registry = OrganismRegistry::new();
        let id = seed(&mut registry);
        let o = registry.get(&id).unwrap();

        assert_eq!(o.generation, 0);
        assert!(o.lineage.is_empty());
        assert_eq!(o.version, INITIAL_VERSION);
        assert_eq!(o.author, DEFAULT_AUTHOR);
        assert_eq!(registry.species_of(&id).as_deref(), Some("Aurora"));
        assert_eq!(registry.species_members("Aurora").len(), 1);
    }

    #[test]
    fn test_register_rejects_empty_input() {
        let mut registry = OrganismRegistry::new();
        assert!(matches!(
            registry.register(NewOrganism::new("", SEED)),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            registry.register(NewOrganism::new("x", "  ")),
            Err(RegistryError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_parent_registers_root() {
        let mut registry = OrganismRegistry::new();
        let id = registry
            .register(NewOrganism::new("orphan", SEED).parent(OrganismId::from("org_ghost")))
            .unwrap();
        let o = registry.get(&id).unwrap();
        assert_eq!(o.generation, 0);
        assert!(o.lineage.is_empty());
        assert!(registry.descendants(&OrganismId::from("org_ghost")).is_empty());
    }

    #[test]
    fn test_lineage_invariant_across_generations() {
        let mut registry = OrganismRegistry::new();
        let mut current = seed(&mut registry);

        for _ in 0..5 {
            let spec = MutationSpec::new().substitute_gate("h", "x");
            let child = registry.evolve(&current, &spec).unwrap();

            let parent = registry.get(&current).unwrap();
            let c = registry.get(&child).unwrap();
            let mut expected = parent.lineage.clone();
            expected.push(parent.id.clone());

            assert_eq!(c.generation, parent.generation + 1);
            assert_eq!(c.lineage, expected);
            assert_eq!(c.author, EVOLUTION_AUTHOR);
            assert_eq!(c.name, format!("{}_gen{}", parent.name, parent.generation + 1));
            current = child;
        }

        let lineage: Vec<u32> = registry.lineage(&current).iter().map(|o| o.generation).collect();
        assert_eq!(lineage, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_evolve_missing_parent() {
        let mut registry = OrganismRegistry::new();
        let spec = MutationSpec::new().shift_parameters(1.1);
        assert!(matches!(
            registry.evolve(&OrganismId::from("org_missing"), &spec),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_evolve_rejects_empty_spec() {
        let mut registry = OrganismRegistry::new();
        let id = seed(&mut registry);
        assert!(matches!(
            registry.evolve(&id, &MutationSpec::new()),
            Err(RegistryError::Validation(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parameter_shift_from_generation_two() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let gate = MutationSpec::new().substitute_gate("cx", "cz");
        let gen1 = registry.evolve(&root, &gate).unwrap();
        let gen2 = registry.evolve(&gen1, &gate).unwrap();
        assert_eq!(registry.get(&gen2).unwrap().generation, 2);

        let spec = MutationSpec::new().shift_parameters(1.1);
        let gen3 = registry.evolve(&gen2, &spec).unwrap();

        let parent = registry.get(&gen2).unwrap();
        let child = registry.get(&gen3).unwrap();
        assert_eq!(child.generation, 3);

        let before = Genome::parse(&parent.genetic_code).numbers();
        let after = Genome::parse(&child.genetic_code).numbers();
        assert_eq!(before.len(), after.len());
        assert!(!before.is_empty());
        for (b, a) in before.iter().zip(&after) {
            assert!((b * 1.1 - a).abs() < 1e-9, "{} * 1.1 != {}", b, a);
        }
        assert_eq!(child.metadata["mutations"]["operators"][0]["factor"], 1.1);
    }

    #[test]
    fn test_update_allow_list() {
        let mut registry = OrganismRegistry::new();
        let id = seed(&mut registry);
        let before = registry.get(&id).unwrap().updated_at;

        assert!(registry.update(
            &id,
            OrganismPatch {
                fitness: Some(0.8),
                consciousness_level: Some(0.6),
                tags: Some(vec!["stable".into()]),
                circuit_qasm: Some("qreg q[1];".into()),
                ..Default::default()
            }
        ));

        let o = registry.get(&id).unwrap();
        assert_eq!(o.fitness, 0.8);
        assert_eq!(o.consciousness_level, 0.6);
        assert_eq!(o.tags, vec!["stable"]);
        assert_eq!(o.circuit_qasm.as_deref(), Some("qreg q[1];"));
        assert_eq!(o.genetic_code, SEED);
        assert!(o.updated_at >= before);

        assert!(!registry.update(&OrganismId::from("org_nope"), OrganismPatch::default()));
    }

    #[test]
    fn test_descendants_preorder() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let spec = MutationSpec::new().shift_parameters(2.0);
        let a = registry.evolve(&root, &spec).unwrap();
        let b = registry.evolve(&root, &spec).unwrap();
        let a1 = registry.evolve(&a, &spec).unwrap();

        let ids: Vec<OrganismId> =
            registry.descendants(&root).iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec![a.clone(), a1, b]);
        assert_eq!(registry.children(&root).len(), 2);
        assert!(registry.descendants(&a).iter().all(|o| o.generation == 2));
    }

    #[test]
    fn test_deep_lineage_does_not_overflow() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let spec = MutationSpec::new().modify_trait("depth", "1");
        let mut current = root.clone();
        for _ in 0..500 {
            current = registry.evolve(&current, &spec).unwrap();
        }
        assert_eq!(registry.descendants(&root).len(), 500);
        assert_eq!(registry.get(&current).unwrap().generation, 500);
    }

    #[test]
    fn test_search_filters_and_order() {
        let mut registry = OrganismRegistry::new();
        let a = registry.register(NewOrganism::new("alpha", SEED).author("ana")).unwrap();
        let b = registry
            .register(NewOrganism::new("beta", "ORGANISM Nova {}").author("bo"))
            .unwrap();
        let c = registry.register(NewOrganism::new("gamma", "ORGANISM Nova { x: 1 }")).unwrap();
        registry.update(&a, OrganismPatch { fitness: Some(0.2), ..Default::default() });
        registry.update(
            &b,
            OrganismPatch {
                fitness: Some(0.9),
                tags: Some(vec!["elite".into()]),
                ..Default::default()
            },
        );
        registry.update(&c, OrganismPatch { fitness: Some(0.5), ..Default::default() });

        let all = registry.search(&SearchFilter::default());
        let names: Vec<&str> = all.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "gamma", "alpha"]);

        let nova = registry.search(&SearchFilter {
            text: Some("nova".into()),
            ..Default::default()
        });
        assert_eq!(nova.len(), 2);

        let fit = registry.search(&SearchFilter { min_fitness: Some(0.5), ..Default::default() });
        assert_eq!(fit.len(), 2);

        let tagged = registry.search(&SearchFilter {
            tags: vec!["elite".into()],
            ..Default::default()
        });
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, b);

        let by_author = registry.search(&SearchFilter {
            author: Some("ana".into()),
            ..Default::default()
        });
        assert_eq!(by_author[0].id, a);
    }

    #[test]
    fn test_top_organisms() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let child = registry.evolve(&root, &MutationSpec::new().shift_parameters(1.2)).unwrap();
        registry.update(
            &root,
            OrganismPatch {
                consciousness_level: Some(0.9),
                ..Default::default()
            },
        );

        assert_eq!(registry.top_organisms(RankMetric::Generation, 1)[0].id, child);
        assert_eq!(registry.top_organisms(RankMetric::Consciousness, 1)[0].id, root);
        assert_eq!(registry.top_organisms(RankMetric::Recent, 1)[0].id, root);
        assert_eq!(registry.top_organisms(RankMetric::Fitness, 10).len(), 2);
    }

    #[test]
    fn test_diversity_index() {
        let mut registry = OrganismRegistry::new();
        assert_eq!(registry.diversity_index(), 0.0);

        for i in 0..4 {
            registry.register(NewOrganism::new(format!("a{}", i), SEED)).unwrap();
        }
        assert_eq!(registry.diversity_index(), 0.0);

        let mut even = OrganismRegistry::new();
        for species in ["A", "B", "C", "D"] {
            for i in 0..3 {
                let code = format!("ORGANISM {} {{}}", species);
                even.register(NewOrganism::new(format!("{}{}", species, i), code)).unwrap();
            }
        }
        assert!((even.diversity_index() - 1.0).abs() < 1e-12);

        even.register(NewOrganism::new("extra", "ORGANISM A {}")).unwrap();
        let skewed = even.diversity_index();
        assert!(skewed > 0.9 && skewed < 1.0);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let child = registry.evolve(&root, &MutationSpec::new().shift_parameters(1.1)).unwrap();
        registry.update(
            &child,
            OrganismPatch {
                fitness: Some(0.73),
                consciousness_level: Some(0.41),
                tags: Some(vec!["exported".into(), "gen1".into()]),
                ..Default::default()
            },
        );

        let snapshot = registry.export(&child).unwrap();
        assert_eq!(snapshot.lineage.len(), 1);

        let mut other = OrganismRegistry::new();
        let imported = other.import(&snapshot, false).unwrap();
        let source = registry.get(&child).unwrap();
        let copy = other.get(&imported).unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.fitness, source.fitness);
        assert_eq!(copy.consciousness_level, source.consciousness_level);
        assert_eq!(copy.tags, source.tags);
        assert_eq!(copy.genetic_code, source.genetic_code);
        assert!(copy.lineage.is_empty());
        assert_eq!(copy.generation, 0);
        assert_eq!(copy.metadata["imported_from"], source.id.as_str());
    }

    #[test]
    fn test_import_preserving_lineage() {
        let mut registry = OrganismRegistry::new();
        let root = seed(&mut registry);
        let spec = MutationSpec::new().shift_parameters(1.1);
        let gen1 = registry.evolve(&root, &spec).unwrap();
        let gen2 = registry.evolve(&gen1, &spec).unwrap();

        let snapshot = registry.export(&gen2).unwrap();
        let mut other = OrganismRegistry::new();
        let imported = other.import(&snapshot, true).unwrap();

        let copy = other.get(&imported).unwrap();
        assert_eq!(copy.generation, 2);
        assert_eq!(other.len(), 3);
        let ancestors: Vec<&str> = other
            .lineage(&imported)
            .iter()
            .map(|o| o.genetic_code.as_str())
            .collect();
        assert_eq!(ancestors[0], registry.get(&root).unwrap().genetic_code);
        assert_eq!(ancestors[1], registry.get(&gen1).unwrap().genetic_code);
        assert!(copy.lineage.iter().all(|id| registry.get(id).is_none()));
    }

    #[test]
    fn test_import_rejects_tampered_snapshot() {
        let mut registry = OrganismRegistry::new();
        let id = seed(&mut registry);
        let mut snapshot = registry.export(&id).unwrap();
        snapshot.organism.genetic_code.push_str("\n// tampered");

        assert!(matches!(registry.import(&snapshot, false), Err(RegistryError::Snapshot(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut registry = OrganismRegistry::new();
        assert_eq!(registry.statistics().total_organisms, 0);

        let root = seed(&mut registry);
        registry.evolve(&root, &MutationSpec::new().shift_parameters(1.1)).unwrap();
        registry.update(&root, OrganismPatch { fitness: Some(0.6), ..Default::default() });

        let stats = registry.statistics();
        assert_eq!(stats.total_organisms, 2);
        assert_eq!(stats.species_count, 1);
        assert_eq!(stats.max_generation, 1);
        assert!((stats.average_fitness - 0.3).abs() < 1e-12);
        assert_eq!(stats.max_fitness, 0.6);
        assert_eq!(stats.authors, vec![EVOLUTION_AUTHOR.to_string(), DEFAULT_AUTHOR.to_string()]);
        assert_eq!(stats.total_lineages, 1);
        assert_eq!(stats.diversity_index, 0.0);
    }

    #[test]
    fn test_non_finite_scores_are_ignored() {
        let mut registry = OrganismRegistry::new();
        let mut ids = Vec::new();
        for i in 0..200 {
            let id = registry.register(NewOrganism::new(format!("o{}", i), SEED)).unwrap();
            let fitness = if i % 7 == 0 { f64::NAN } else { (i % 13) as f64 / 13.0 };
            let patch = OrganismPatch {
                fitness: Some(fitness),
                ..Default::default()
            };
            assert!(registry.update(&id, patch));
            ids.push(id);
        }
        registry.update(
            &ids[1],
            OrganismPatch {
                consciousness_level: Some(f64::INFINITY),
                ..Default::default()
            },
        );

        assert_eq!(registry.get(&ids[0]).unwrap().fitness, 0.0);
        assert_eq!(registry.get(&ids[1]).unwrap().consciousness_level, 0.0);

        let all = registry.search(&SearchFilter::default());
        assert_eq!(all.len(), 200);
        assert!(all.windows(2).all(|w| w[0].fitness >= w[1].fitness));
        assert_eq!(registry.top_organisms(RankMetric::Consciousness, 5).len(), 5);
    }

    #[test]
    fn test_descending_order_is_total() {
        let mut values = vec![0.3, f64::NAN, 0.9, f64::NEG_INFINITY, 0.1, f64::NAN];
        values.sort_by(|a, b| desc_f64(*a, *b));
        assert!(values[0].is_nan() && values[1].is_nan());
        assert_eq!(&values[2..], &[0.9, 0.3, 0.1, f64::NEG_INFINITY]);
    }
}
