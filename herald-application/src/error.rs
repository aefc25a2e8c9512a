use herald_core::error::EventError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("event: {0}")]
    Event(#[from] EventError),

    #[error("component already defined: {component}")]
    AlreadyDefinedComponent { component: String },

    #[error("component not defined: {component}")]
    UndefinedComponent { component: String },

    #[error("scope not active: component={component}, scope={scope}")]
    InactiveScope { component: String, scope: String },
}
