//! Category lookup with a read-through override layer.
//!
//! The compiled-in table is the fallback. A [`CategorySource`] may shadow an
//! entry field by field or disable it entirely; callers always get either a
//! fully populated [`Category`] or `UnknownCategory`.

use crate::category::{builtin_categories, Category, GeometryHint};
use crate::error::{Error, Result};
use crate::types::{Capability, CategoryId, CompositionMode, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Partial replacement for a taxonomy entry. Unset fields keep the default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryOverride {
    pub id: CategoryId,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeSet<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forbidden: Option<BTreeSet<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_targets: Option<BTreeSet<CategoryId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_sources: Option<BTreeSet<CategoryId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_maxims: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forbidden_maxims: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryHint>,
}

impl CategoryOverride {
    pub fn new(id: CategoryId) -> Self {
        Self {
            id,
            disabled: false,
            capabilities: None,
            forbidden: None,
            valid_targets: None,
            valid_sources: None,
            composition: None,
            required_maxims: None,
            forbidden_maxims: None,
            geometry: None,
        }
    }

    pub fn disable(id: CategoryId) -> Self {
        Self {
            disabled: true,
            ..Self::new(id)
        }
    }

    pub fn with_composition(mut self, mode: CompositionMode) -> Self {
        self.composition = Some(mode);
        self
    }

    pub fn with_forbidden_maxims<I, S>(mut self, maxims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_maxims = Some(maxims.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_required_maxims<I, S>(mut self, maxims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_maxims = Some(maxims.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_forbidden(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.forbidden = Some(caps.into_iter().collect());
        self
    }

    /// Shadow `base` with every field this override sets.
    pub fn apply(&self, base: &Category) -> Category {
        let mut cat = base.clone();
        if let Some(v) = &self.capabilities {
            cat.capabilities = v.clone();
        }
        if let Some(v) = &self.forbidden {
            cat.forbidden = v.clone();
        }
        if let Some(v) = &self.valid_targets {
            cat.valid_targets = v.clone();
        }
        if let Some(v) = &self.valid_sources {
            cat.valid_sources = v.clone();
        }
        if let Some(v) = self.composition {
            cat.composition = v;
        }
        if let Some(v) = &self.required_maxims {
            cat.required_maxims = v.clone();
        }
        if let Some(v) = &self.forbidden_maxims {
            cat.forbidden_maxims = v.clone();
        }
        if let Some(v) = &self.geometry {
            cat.geometry = v.clone();
        }
        cat
    }
}

/// External category configuration consulted before the compiled defaults.
pub trait CategorySource: Send + Sync {
    fn lookup(&self, id: CategoryId) -> Option<CategoryOverride>;
}

/// In-memory override table, typically loaded from config.
#[derive(Clone, Debug, Default)]
pub struct StaticOverrides {
    entries: HashMap<CategoryId, CategoryOverride>,
}

impl StaticOverrides {
    /// Build the table. Later entries for the same id replace earlier ones.
    pub fn new(overrides: impl IntoIterator<Item = CategoryOverride>) -> Self {
        let entries = overrides.into_iter().map(|o| (o.id, o)).collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CategorySource for StaticOverrides {
    fn lookup(&self, id: CategoryId) -> Option<CategoryOverride> {
        self.entries.get(&id).cloned()
    }
}

/// The category registry every other component consults. Cheap to clone.
#[derive(Clone)]
pub struct Taxonomy {
    defaults: Arc<HashMap<CategoryId, Arc<Category>>>,
    source: Option<Arc<dyn CategorySource>>,
}

impl fmt::Debug for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Taxonomy")
            .field("defaults", &self.defaults.len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Taxonomy {
    pub fn builtin() -> Self {
        let defaults = builtin_categories()
            .into_iter()
            .map(|c| (c.id, Arc::new(c)))
            .collect();
        Self {
            defaults: Arc::new(defaults),
            source: None,
        }
    }

    /// Layer an override source over the compiled defaults, rejecting it if
    /// any entry it currently yields breaks a category invariant.
    pub fn with_source(mut self, source: impl CategorySource + 'static) -> Result<Self> {
        for (id, base) in self.defaults.iter() {
            if let Some(o) = source.lookup(*id).filter(|o| !o.disabled) {
                o.apply(base).validate()?;
            }
        }
        self.source = Some(Arc::new(source));
        Ok(self)
    }

    /// Layer a fixed set of overrides. Same checks as [`Taxonomy::with_source`].
    pub fn with_overrides(self, overrides: Vec<CategoryOverride>) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(self);
        }
        self.with_source(StaticOverrides::new(overrides))
    }

    pub fn get(&self, id: CategoryId) -> Result<Arc<Category>> {
        let base = self
            .defaults
            .get(&id)
            .ok_or_else(|| Error::UnknownCategory(id.name().to_string()))?;
        match self.source.as_ref().and_then(|s| s.lookup(id)) {
            None => Ok(base.clone()),
            Some(o) if o.disabled => Err(Error::UnknownCategory(id.name().to_string())),
            Some(o) => {
                let cat = o.apply(base);
                cat.validate()?;
                Ok(Arc::new(cat))
            }
        }
    }

    /// Look up by name, e.g. `"sensory"`.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Category>> {
        self.get(CategoryId::parse(name)?)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.get(id).is_ok()
    }

    /// Every enabled category, in identifier order. An entry a live source
    /// has since made invalid is skipped with a warning.
    pub fn all(&self) -> Vec<Arc<Category>> {
        CategoryId::all()
            .iter()
            .filter_map(|id| match self.get(*id) {
                Ok(cat) => Some(cat),
                Err(Error::UnknownCategory(_)) => None,
                Err(e) => {
                    tracing::warn!(category = %id, error = %e, "skipping invalid category override");
                    None
                }
            })
            .collect()
    }

    pub fn list_by_role(&self, role: Role) -> Vec<Arc<Category>> {
        self.all().into_iter().filter(|c| c.role == role).collect()
    }

    pub fn list_by_capability(&self, capability: Capability) -> Vec<Arc<Category>> {
        self.all()
            .into_iter()
            .filter(|c| c.capability_allowed(capability))
            .collect()
    }

    pub fn valid_targets(&self, id: CategoryId) -> Result<Vec<CategoryId>> {
        Ok(self.get(id)?.valid_targets.iter().copied().collect())
    }

    pub fn valid_sources(&self, id: CategoryId) -> Result<Vec<CategoryId>> {
        Ok(self.get(id)?.valid_sources.iter().copied().collect())
    }

    pub fn capability_allowed(&self, id: CategoryId, capability: Capability) -> Result<bool> {
        Ok(self.get(id)?.capability_allowed(capability))
    }

    /// Fails with the first maxim `a` requires that `b` forbids.
    pub fn check_maxim_compatibility(&self, a: CategoryId, b: CategoryId) -> Result<()> {
        let from = self.get(a)?;
        let to = self.get(b)?;
        maxim_conflict(&from, &to)
    }
}

pub(crate) fn maxim_conflict(from: &Category, to: &Category) -> Result<()> {
    match from
        .required_maxims
        .iter()
        .find(|m| to.forbidden_maxims.contains(*m))
    {
        Some(term) => Err(Error::MaximConflict(term.clone())),
        None => Ok(()),
    }
}
