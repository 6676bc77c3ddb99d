//! Shared type definitions for activity IO declarations and persisted activation state.
//!
//! The declaration models are pure data loaded once per activity definition; the engine
//! compiles them and binds them to execution contexts. The state models are the stable,
//! serializable snapshot format used to suspend and resume activations.

pub mod declaration;
pub mod state;

pub use declaration::{
    ActivityDeclaration, ConnectorDeclaration, DataAssociationDeclaration, DataObjectReferenceDeclaration, DataPortDeclaration,
    DefinitionDeclaration, DefinitionKind, FormDeclaration, FormFieldDeclaration, InputOutputDeclaration, IoSpecificationDeclaration,
    ListItemDeclaration, LoopDeclaration, MapEntryDeclaration, ParameterDeclaration, PropertyDeclaration,
};
pub use state::{ActivationState, FieldState, FormState, IoSpecificationState, IoState};
