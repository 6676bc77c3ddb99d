//! Formal data input/output ports.
//!
//! Each port is wired through an association to a process-level data object. An association
//! may point at a data object reference, which is followed to the referenced data object id.
//! Inputs read that id from the [`DataObjectStore`]; inputs without an association read their
//! name from the activation scope instead (loop `item`/`index` for example). Outputs pick their
//! name out of the activity result and are written back to the store on save.

use bpmn_io_types::{DataAssociationDeclaration, DataPortDeclaration, IoSpecificationDeclaration};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::context::Scope;
use crate::environment::DataObjectStore;
use crate::error::ActivationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPort {
    pub id: String,
    pub name: String,
    /// Associated data object id, when the port is wired.
    pub data_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoSpecification {
    inputs: Vec<DataPort>,
    outputs: Vec<DataPort>,
}

impl IoSpecification {
    pub fn compile(declaration: &IoSpecificationDeclaration) -> Self {
        let data_object_id = |target: &str| {
            declaration
                .data_object_references
                .iter()
                .find(|reference| reference.id == target)
                .map(|reference| reference.data_object_ref.clone())
                .unwrap_or_else(|| target.to_string())
        };
        let wire = |ports: &[DataPortDeclaration], associations: &[DataAssociationDeclaration]| {
            ports
                .iter()
                .map(|port| DataPort {
                    id: port.id.clone(),
                    name: port.name.clone(),
                    data_object_id: associated_ref(&port.id, associations).map(&data_object_id),
                })
                .collect::<Vec<_>>()
        };
        Self {
            inputs: wire(&declaration.data_inputs, &declaration.data_input_associations),
            outputs: wire(&declaration.data_outputs, &declaration.data_output_associations),
        }
    }

    pub fn inputs(&self) -> &[DataPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DataPort] {
        &self.outputs
    }

    pub fn resolve_input(&self, scope: &Scope, data_objects: &DataObjectStore) -> IndexMap<String, Value> {
        let mut input = IndexMap::new();
        for port in &self.inputs {
            let value = match &port.data_object_id {
                Some(data_object_id) => data_objects.get(data_object_id),
                None => scope.get(&port.name).cloned(),
            };
            if let Some(value) = value {
                input.insert(port.name.clone(), value);
            }
        }
        input
    }

    /// Picks every output port name present in `source`.
    pub fn resolve_output(&self, source: &IndexMap<String, Value>) -> IndexMap<String, Value> {
        self.outputs
            .iter()
            .filter_map(|port| source.get(&port.name).map(|value| (port.name.clone(), value.clone())))
            .collect()
    }

    /// Writes associated outputs present in `output` to the store.
    pub fn save(&self, output: &IndexMap<String, Value>, data_objects: &DataObjectStore) -> ActivationResult<()> {
        for port in &self.outputs {
            if let (Some(data_object_id), Some(value)) = (&port.data_object_id, output.get(&port.name)) {
                data_objects.set(data_object_id, value.clone())?;
            }
        }
        Ok(())
    }

    /// Writes one array per associated output, ordered like `iteration_outputs`.
    pub fn save_loop(&self, iteration_outputs: &[IndexMap<String, Value>], data_objects: &DataObjectStore) -> ActivationResult<()> {
        for port in &self.outputs {
            let Some(data_object_id) = &port.data_object_id else {
                continue;
            };
            let values: Vec<Value> = iteration_outputs
                .iter()
                .filter_map(|output| output.get(&port.name).cloned())
                .collect();
            if values.is_empty() {
                continue;
            }
            debug!(data_object_id = %data_object_id, iterations = values.len(), "saving loop output");
            data_objects.set(data_object_id, Value::Array(values))?;
        }
        Ok(())
    }
}

/// The other end of the association touching `port_id`, in either direction.
fn associated_ref<'a>(port_id: &str, associations: &'a [DataAssociationDeclaration]) -> Option<&'a str> {
    associations.iter().find_map(|association| {
        if association.source_ref == port_id {
            Some(association.target_ref.as_str())
        } else if association.target_ref == port_id {
            Some(association.source_ref.as_str())
        } else {
            None
        }
    })
}
