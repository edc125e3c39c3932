//! Parameter reconciliation.
//!
//! The server reports one merged parameter view per project and offers no
//! marker telling inherited values apart from local definitions or local
//! overrides. Everything here works by diffing against the parent project's
//! own merged view:
//!
//! - [`merge_for_create`] builds the full parameter set for a new project.
//! - [`plan_update`] computes the deletes and replaces that move an existing
//!   project from one desired state to another.
//! - [`reconstruct`] rebuilds configuration state from remote truth.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::codec::{self, ParameterDefinition};
use super::{Parameter, Parameters};
use crate::error::ProviderError;

/// Flat `parameter_values` block: name to value.
pub type ParameterValues = BTreeMap<String, String>;

/// The parameter half of a project's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesiredParameters {
    /// Owned definitions decoded from the `parameter` block.
    pub specs: Parameters,
    /// Value overrides from `parameter_values`.
    pub values: ParameterValues,
}

impl DesiredParameters {
    /// Build from the two configuration blocks.
    pub fn new(definitions: &[ParameterDefinition], values: &ParameterValues) -> Self {
        Self {
            specs: codec::decode(definitions),
            values: values.clone(),
        }
    }

    /// The parameter that `name` resolves to once its value override is applied.
    ///
    /// An owned definition keeps its spec. A name inherited from the parent is
    /// overridden by value alone, since the spec belongs to the parent.
    fn resolve(&self, parent: &Parameters, name: &str, value: &str) -> Parameter {
        match (self.specs.get(name), parent.get(name)) {
            (Some(owned), _) => owned.clone().with_value(value),
            (None, Some(inherited)) => inherited.as_override().with_value(value),
            (None, None) => Parameter::value_only(value),
        }
    }

    /// Owned definitions with their overrides applied.
    fn resolved_specs(&self, parent: &Parameters) -> Parameters {
        self.specs
            .iter()
            .map(|(name, spec)| {
                let parameter = match self.values.get(name) {
                    Some(value) => self.resolve(parent, name, value),
                    None => spec.clone(),
                };
                (name.clone(), parameter)
            })
            .collect()
    }
}

/// Remote mutations computed for an update. Deletes are applied before replaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterChanges {
    /// Parameters to delete.
    pub delete: BTreeSet<String>,
    /// Parameters to create or overwrite.
    pub replace: Parameters,
}

impl ParameterChanges {
    /// Whether no remote call is needed.
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.replace.is_empty()
    }
}

/// Fail when a definition would shadow a parameter the parent already owns.
pub fn ensure_no_redefinition(
    parent: &Parameters,
    specs: &Parameters,
) -> Result<(), ProviderError> {
    match specs
        .keys()
        .find(|name| parent.get(*name).is_some_and(Parameter::is_owned))
    {
        Some(name) => Err(ProviderError::ParentParameterRedefined(name.clone())),
        None => Ok(()),
    }
}

/// The complete parameter set to submit when creating a project.
pub fn merge_for_create(
    parent: &Parameters,
    desired: &DesiredParameters,
) -> Result<Parameters, ProviderError> {
    ensure_no_redefinition(parent, &desired.specs)?;

    let mut merged = desired.specs.clone();
    for (name, value) in &desired.values {
        merged.insert(name.clone(), desired.resolve(parent, name, value));
    }

    debug!(
        parameters = ?merged.keys().collect::<Vec<_>>(),
        "Merged parameters for create"
    );
    Ok(merged)
}

/// The deletes and replaces that take a project from `prior` to `desired`.
///
/// Identical prior and desired states produce no changes at all.
pub fn plan_update(
    parent: &Parameters,
    prior: &DesiredParameters,
    desired: &DesiredParameters,
) -> Result<ParameterChanges, ProviderError> {
    ensure_no_redefinition(parent, &desired.specs)?;

    if prior == desired {
        return Ok(ParameterChanges::default());
    }

    let delete = prior
        .specs
        .keys()
        .filter(|name| !desired.specs.contains_key(*name))
        .cloned()
        .collect();

    let before = prior.resolved_specs(parent);
    let mut replace: Parameters = desired
        .resolved_specs(parent)
        .into_iter()
        .filter(|(name, parameter)| before.get(name) != Some(parameter))
        .collect();

    // an override is always written, even when unchanged
    for (name, value) in &desired.values {
        replace.insert(name.clone(), desired.resolve(parent, name, value));
    }

    let changes = ParameterChanges { delete, replace };
    debug!(
        delete = ?changes.delete,
        replace = ?changes.replace.keys().collect::<Vec<_>>(),
        "Planned parameter update"
    );
    Ok(changes)
}

/// Parameters observed on the server, split back into configuration blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservedParameters {
    /// Parameters owned by the project, to be encoded as the `parameter` block.
    pub specs: Parameters,
    /// The `parameter_values` block.
    pub values: ParameterValues,
}

/// The block entry for an owned parameter whose live value may come from an
/// override. While `parameter_values` tracks the name, the live value belongs
/// there and the definition keeps its declared value.
fn declared(current: &DesiredParameters, name: &str, live: &Parameter) -> Parameter {
    match current.specs.get(name) {
        Some(known) if current.values.contains_key(name) => {
            live.clone().with_value(known.value.clone())
        }
        _ => live.clone(),
    }
}

/// Rebuild configuration blocks from a project's merged view.
///
/// `current` is the configuration state from the previous apply. It is
/// consulted only for secrets, which the server redacts, and to decide
/// whether an owned parameter's value is tracked through `parameter_values`.
pub fn reconstruct(
    effective: &Parameters,
    parent: &Parameters,
    current: &DesiredParameters,
) -> ObservedParameters {
    let mut observed = ObservedParameters::default();

    for (name, parameter) in effective {
        if let Some(inherited) = parent.get(name) {
            if inherited.value != parameter.value {
                observed.values.insert(name.clone(), parameter.value.clone());
            }
            // inherited definitions and plain overrides are not local specs
            let drop_spec = inherited.is_owned() || !parameter.is_owned();
            if !drop_spec {
                observed.specs.insert(name.clone(), declared(current, name, parameter));
            }
            continue;
        }

        if !parameter.is_owned() {
            if !parameter.value.is_empty() {
                observed.values.insert(name.clone(), parameter.value.clone());
            }
            continue;
        }

        let mut owned = parameter.clone();
        if !parameter.value.is_empty() {
            if current.values.contains_key(name) {
                observed.values.insert(name.clone(), parameter.value.clone());
                owned = declared(current, name, parameter);
            }
        } else if parameter.is_secret() {
            if let Some(value) = current.values.get(name).filter(|v| !v.is_empty()) {
                observed.values.insert(name.clone(), value.clone());
            }
            if let Some(known) = current.specs.get(name) {
                owned.value = known.value.clone();
            }
        }
        observed.specs.insert(name.clone(), owned);
    }

    debug!(
        specs = ?observed.specs.keys().collect::<Vec<_>>(),
        values = ?observed.values.keys().collect::<Vec<_>>(),
        "Reconstructed parameters"
    );
    observed
}
