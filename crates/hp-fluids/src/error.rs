use thiserror::Error;

pub type FluidResult<T> = Result<T, FluidError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FluidError {
    /// Input or output outside physical bounds (zero pressure, NaN enthalpy).
    #[error("{what}")]
    NonPhysical { what: &'static str },

    /// State the property backend cannot evaluate, e.g. a saturation query
    /// above the critical point.
    #[error("property query out of range: {what}")]
    OutOfRange { what: String },

    #[error("refrigerant `{name}` is not known")]
    UnknownFluid { name: String },

    #[error("property backend failed: {message}")]
    Backend { message: String },

    #[error("refrigerant catalog: {message}")]
    Catalog { message: String },
}
